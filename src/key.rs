//! Sort key extraction.

use crate::sort::SortError;

/// Derives a sort key from a line record.
///
/// The record is split by the exact delimiter bytes (no quoting or escaping is recognized) and the fields at
/// the configured zero-based columns are concatenated in the configured order without a separator.
/// Records are not required to be valid UTF-8.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyExtractor {
    columns: Vec<usize>,
    delimiter: Vec<u8>,
}

impl KeyExtractor {
    /// Creates a key extractor.
    ///
    /// # Arguments
    /// * `columns` - Zero-based column indices the key is composed of
    /// * `delimiter` - Field delimiter
    pub fn new(columns: Vec<usize>, delimiter: impl Into<Vec<u8>>) -> Self {
        KeyExtractor {
            columns,
            delimiter: delimiter.into(),
        }
    }

    pub fn columns(&self) -> &[usize] {
        &self.columns
    }

    pub fn delimiter(&self) -> &[u8] {
        &self.delimiter
    }

    /// Extracts the key of a record.
    /// Fails with [`SortError::KeyOutOfRange`] if the record has fewer fields than a configured column requires.
    pub fn extract(&self, record: &[u8]) -> Result<Vec<u8>, SortError> {
        let mut key = Vec::new();
        for &column in &self.columns {
            match Fields::new(record, &self.delimiter).nth(column) {
                Some(field) => key.extend_from_slice(field),
                None => {
                    return Err(SortError::KeyOutOfRange {
                        column,
                        record: record.to_vec(),
                    })
                }
            }
        }

        return Ok(key);
    }
}

impl Default for KeyExtractor {
    fn default() -> Self {
        KeyExtractor::new(vec![0], " ")
    }
}

/// Iterator over the delimiter separated fields of a record.
struct Fields<'a> {
    rest: Option<&'a [u8]>,
    delimiter: &'a [u8],
}

impl<'a> Fields<'a> {
    fn new(record: &'a [u8], delimiter: &'a [u8]) -> Self {
        Fields {
            rest: Some(record),
            delimiter,
        }
    }
}

impl<'a> Iterator for Fields<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        let rest = self.rest?;

        // an empty delimiter never matches, the record is a single field
        let position = if self.delimiter.is_empty() {
            None
        } else {
            rest.windows(self.delimiter.len()).position(|window| window == self.delimiter)
        };

        match position {
            Some(position) => {
                self.rest = Some(&rest[position + self.delimiter.len()..]);
                Some(&rest[..position])
            }
            None => {
                self.rest = None;
                Some(rest)
            }
        }
    }
}

#[cfg(test)]
mod test {
    use rstest::*;

    use super::{Fields, KeyExtractor};
    use crate::sort::SortError;

    #[rstest]
    #[case(vec![0], ",", "3,b", "3")]
    #[case(vec![1], ",", "3,b", "b")]
    #[case(vec![2, 0], ",", "a,b,c", "ca")]
    #[case(vec![0, 1, 2], "\t", "x\ty\tz", "xyz")]
    #[case(vec![1], "::", "a::b:c::d", "b:c")]
    #[case(vec![0], " ", "single", "single")]
    #[case(vec![1], ",", "a,,c", "")]
    #[case(vec![2], ",", "a,b,", "")]
    #[case(vec![0], ",", "", "")]
    fn test_extract(
        #[case] columns: Vec<usize>,
        #[case] delimiter: &str,
        #[case] record: &str,
        #[case] expected: &str,
    ) {
        let extractor = KeyExtractor::new(columns, delimiter);
        assert_eq!(extractor.extract(record.as_bytes()).unwrap(), expected.as_bytes());
        // extraction is pure
        assert_eq!(
            extractor.extract(record.as_bytes()).unwrap(),
            extractor.extract(record.as_bytes()).unwrap()
        );
    }

    #[test]
    fn test_extract_invalid_utf8() {
        let extractor = KeyExtractor::new(vec![1, 0], ",");
        assert_eq!(extractor.extract(b"b,caf\xe9").unwrap(), b"caf\xe9b".to_vec());
    }

    #[test]
    fn test_extract_out_of_range() {
        let extractor = KeyExtractor::new(vec![0, 3], ",");

        match extractor.extract(b"a,b") {
            Err(SortError::KeyOutOfRange { column, record }) => {
                assert_eq!(column, 3);
                assert_eq!(record, b"a,b".to_vec());
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[rstest]
    #[case("a,,b", ",", vec!["a", "", "b"])]
    #[case("a,b,", ",", vec!["a", "b", ""])]
    #[case("a<>b", "<>", vec!["a", "b"])]
    #[case("a,b", "", vec!["a,b"])]
    fn test_fields(#[case] record: &str, #[case] delimiter: &str, #[case] expected: Vec<&str>) {
        let fields = Vec::from_iter(Fields::new(record.as_bytes(), delimiter.as_bytes()));
        let expected = Vec::from_iter(expected.iter().map(|field| field.as_bytes()));
        assert_eq!(fields, expected);
    }

    #[test]
    fn test_default_extractor() {
        let extractor = KeyExtractor::default();
        assert_eq!(extractor.columns(), &[0]);
        assert_eq!(extractor.delimiter(), b" ");
        assert_eq!(extractor.extract(b"b a").unwrap(), b"b".to_vec());
    }
}
