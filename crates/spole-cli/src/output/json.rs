use spole_core::error::SpoleError;
use spole_core::model::Extraction;

pub fn print(extraction: &Extraction) -> Result<(), SpoleError> {
    let json = serde_json::to_string_pretty(extraction)?;
    println!("{json}");
    Ok(())
}
