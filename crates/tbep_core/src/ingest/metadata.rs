//! Disease-name and property-description pair files.

use crate::error::{PipelineResult, ValidationError};

pub const PROPERTY_NAME: &str = "property_name";
pub const PROPERTY_DESCRIPTION: &str = "property_description";

/// Reads headerless `id,name` rows. Rows missing either field are skipped.
pub fn read_disease_names<R: std::io::Read>(
    reader: &mut csv::Reader<R>,
) -> PipelineResult<Vec<(String, String)>> {
    collect_pairs(reader.records(), 0, 1)
}

/// Reads `property_name,property_description` rows; both headers are required.
pub fn read_property_descriptions<R: std::io::Read>(
    reader: &mut csv::Reader<R>,
) -> PipelineResult<Vec<(String, String)>> {
    let headers = reader.headers()?.clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|header| header.trim() == name)
            .ok_or_else(|| ValidationError::MissingColumn(name.to_string()))
    };
    let name_index = column(PROPERTY_NAME)?;
    let description_index = column(PROPERTY_DESCRIPTION)?;
    collect_pairs(reader.records(), name_index, description_index)
}

fn collect_pairs<I>(records: I, key: usize, value: usize) -> PipelineResult<Vec<(String, String)>>
where
    I: Iterator<Item = Result<csv::StringRecord, csv::Error>>,
{
    let mut pairs = Vec::new();
    for record in records {
        let record = record?;
        let key = record.get(key).map(str::trim).unwrap_or_default();
        let value = record.get(value).map(str::trim).unwrap_or_default();
        if key.is_empty() || value.is_empty() {
            continue;
        }
        pairs.push((key.to_string(), value.to_string()));
    }
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::{read_disease_names, read_property_descriptions};
    use crate::error::{PipelineError, ValidationError};

    #[test]
    fn disease_pairs_skip_incomplete_rows() {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader("MONDO_0004976,amyotrophic lateral sclerosis\nEFO_0000095\n".as_bytes());
        let pairs = read_disease_names(&mut reader).unwrap();
        assert_eq!(
            pairs,
            vec![(
                "MONDO_0004976".to_string(),
                "amyotrophic lateral sclerosis".to_string()
            )]
        );
    }

    #[test]
    fn description_columns_are_located_by_header() {
        let mut reader = csv::ReaderBuilder::new().from_reader(
            "property_description,property_name\nPathway membership,Pathway_KEGG\n".as_bytes(),
        );
        let pairs = read_property_descriptions(&mut reader).unwrap();
        assert_eq!(pairs[0].0, "Pathway_KEGG");
        assert_eq!(pairs[0].1, "Pathway membership");
    }

    #[test]
    fn description_header_is_required() {
        let mut reader = csv::ReaderBuilder::new().from_reader("name,desc\na,b\n".as_bytes());
        let err = read_property_descriptions(&mut reader).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Validation(ValidationError::MissingColumn(column)) if column == "property_name"
        ));
    }
}
