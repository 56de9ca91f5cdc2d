use serde_derive::Deserialize;

/// One captured line, stripped and split on commas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    line: String,
    fields: Vec<String>,
}

impl Record {

    /// Decode a raw line and split it into fields.
    ///
    /// Returns `Ok(None)` when nothing but whitespace is left after
    /// stripping. Invalid UTF-8 is an error unless `lossy` is set.
    pub fn parse(raw: &[u8], lossy: bool) -> anyhow::Result<Option<Record>> {
        let decoded = if lossy {
            String::from_utf8_lossy(raw).into_owned()
        } else {
            String::from_utf8(raw.to_vec())
                .map_err(|e| anyhow::anyhow!("Failed to decode line as UTF-8: {}", e))?
        };

        let line = decoded.trim();
        if line.is_empty() {
            return Ok(None);
        }

        Ok(Some(Record {
            line: line.to_string(),
            fields: line.split(',').map(|field| field.to_string()).collect(),
        }))
    }

    pub fn line(&self) -> &str {
        &self.line
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }
}

/// Optional check applied to every record before it is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Validation {
    #[default]
    Permissive,
    Numeric,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RecordCheck {
    pub validation: Validation,
    pub expected_fields: Option<usize>,
}

impl RecordCheck {
    pub fn check(&self, record: &Record) -> Result<(), String> {
        if self.validation == Validation::Permissive {
            return Ok(());
        }

        if let Some(expected) = self.expected_fields {
            if record.fields().len() != expected {
                return Err(format!("Expected {} fields, got {}", expected, record.fields().len()));
            }
        }

        for (index, field) in record.fields().iter().enumerate() {
            if field.trim().parse::<f64>().is_err() {
                return Err(format!("Field {} is not numeric: {:?}", index, field));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_stripped_line_on_commas() {
        let record = Record::parse(b"  1,0.1,0.2,9.8\r\n", false).unwrap().unwrap();
        assert_eq!(record.line(), "1,0.1,0.2,9.8");
        assert_eq!(record.fields(), ["1", "0.1", "0.2", "9.8"]);
    }

    #[test]
    fn blank_lines_yield_nothing() {
        assert!(Record::parse(b"\n", false).unwrap().is_none());
        assert!(Record::parse(b" \t \r\n", false).unwrap().is_none());
        assert!(Record::parse(b"", false).unwrap().is_none());
    }

    #[test]
    fn keeps_empty_and_odd_fields_as_is() {
        let record = Record::parse(b"a,,b ,\n", false).unwrap().unwrap();
        assert_eq!(record.fields(), ["a", "", "b ", ""]);
    }

    #[test]
    fn invalid_utf8_is_an_error_unless_lossy() {
        let raw = b"1,\xff,3\n";
        assert!(Record::parse(raw, false).is_err());

        let record = Record::parse(raw, true).unwrap().unwrap();
        assert_eq!(record.fields().len(), 3);
        assert_eq!(record.fields()[1], "\u{FFFD}");
    }

    #[test]
    fn permissive_check_accepts_anything() {
        let record = Record::parse(b"hello,world", false).unwrap().unwrap();
        assert!(RecordCheck::default().check(&record).is_ok());
    }

    #[test]
    fn numeric_check_rejects_text_and_wrong_width() {
        let check = RecordCheck { validation: Validation::Numeric, expected_fields: Some(3) };

        let good = Record::parse(b"1,-0.5,9.81", false).unwrap().unwrap();
        assert!(check.check(&good).is_ok());

        let text = Record::parse(b"1,abc,9.81", false).unwrap().unwrap();
        assert!(check.check(&text).is_err());

        let short = Record::parse(b"1,2", false).unwrap().unwrap();
        assert!(check.check(&short).is_err());
    }
}
