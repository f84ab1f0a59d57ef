// Fixed fragments of the prompts sent to the model. Section order inside a
// forecast prompt is fixed by `builder::build_prompt`.

pub const FORECAST_INTRO: &str = "Genera un rolling forecast per";

pub const SECTION_HISTORICAL: &str = "Dati storici:";
pub const SECTION_INFO: &str = "Informazioni:";
pub const SECTION_ASSUMPTIONS: &str = "Assunzioni di crescita:";
pub const SECTION_HORIZON: &str = "Orizzonte di previsione:";

pub const EMPTY_HISTORICAL: &str = "(nessun dato storico fornito)";
pub const EMPTY_INFO: &str = "(nessuna informazione aggiuntiva)";
pub const EMPTY_ASSUMPTIONS: &str = "(nessuna assunzione specifica)";

pub const FORMAT_DIRECTIVE: &str =
    "Fornisci una previsione dettagliata in formato CSV con le seguenti colonne (separate da virgole), in questo ordine:";

pub const EXPLANATION_DIRECTIVE: &str = "Dopo il CSV lascia una riga vuota e aggiungi una breve spiegazione testuale delle ipotesi adottate. Non inserire testo tra le righe del CSV.";

pub const ANALYSIS_REQUEST: &str = r#"Fornisci un'analisi dettagliata che includa:
1. Tendenze generali nelle vendite e nei costi
2. Periodi di picco e di bassa per vendite e costi
3. Analisi della redditività nel tempo
4. Potenziali rischi o opportunità identificati
5. Raccomandazioni per migliorare la performance finanziaria

Presenta l'analisi in un formato chiaro e strutturato."#;

pub const EXTRACTION_INSTRUCTIONS: &str = r#"Rispondi SOLO con un oggetto JSON valido conforme allo schema seguente, senza testo aggiuntivo.
- Inserisci esattamente un elemento in `items` per ciascun dato richiesto, usando il nome del dato richiesto come `criterion`.
- `value` è un numero (senza simboli di valuta o separatori delle migliaia) oppure null se il dato non è presente nel testo.
- `period` indica l'esercizio o la data di riferimento se è indicata, altrimenti null.
- Non inventare valori e non aggiungere dati non richiesti."#;
