use serde::{Deserialize, Serialize};

/// Identity fields submitted with every enrollment capture.
///
/// Capture is inadmissible while any field is blank.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentForm {
    pub subject_id: String,
    pub first_name: String,
    pub last_name: String,
    /// Class, section or cohort the subject is enrolled under.
    pub classification: String,
}

impl EnrollmentForm {
    pub fn new(
        subject_id: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        classification: impl Into<String>,
    ) -> Self {
        Self {
            subject_id: subject_id.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            classification: classification.into(),
        }
    }

    /// Field names paired with their values, in submission order.
    pub fn fields(&self) -> [(&'static str, &str); 4] {
        [
            ("subject_id", self.subject_id.as_str()),
            ("first_name", self.first_name.as_str()),
            ("last_name", self.last_name.as_str()),
            ("classification", self.classification.as_str()),
        ]
    }

    pub fn missing_fields(&self) -> Vec<&'static str> {
        self.fields()
            .into_iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| name)
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_form() {
        let form = EnrollmentForm::new("S-001", "Ada", "Lovelace", "CS-101");
        assert!(form.is_complete());
        assert!(form.missing_fields().is_empty());
    }

    #[test]
    fn test_default_form_is_incomplete() {
        let form = EnrollmentForm::default();
        assert!(!form.is_complete());
        assert_eq!(form.missing_fields().len(), 4);
    }

    #[test]
    fn test_whitespace_counts_as_missing() {
        let form = EnrollmentForm::new("S-001", "  ", "Lovelace", "\t");
        assert_eq!(form.missing_fields(), vec!["first_name", "classification"]);
    }

    #[test]
    fn test_fields_order() {
        let form = EnrollmentForm::new("1", "a", "b", "c");
        let names: Vec<&str> = form.fields().iter().map(|(n, _)| *n).collect();
        assert_eq!(
            names,
            vec!["subject_id", "first_name", "last_name", "classification"]
        );
    }
}
