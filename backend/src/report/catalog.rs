use shared::{TumorInfo, UNRECOGNIZED_LABEL};
use std::collections::HashMap;

/// Read-only reference text keyed by label.
///
/// Keys are normalized (lower-case, alphanumerics only) so `no_tumor`,
/// `notumor` and `No Tumor` all hit the same entry.
#[derive(Debug, Clone)]
pub struct TumorCatalog {
    entries: HashMap<String, TumorInfo>,
}

pub fn catalog_key(label: &str) -> String {
    label
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

fn info(risk_level: &str, description: &str, symptoms: &str) -> TumorInfo {
    TumorInfo {
        risk_level: risk_level.to_string(),
        description: description.to_string(),
        symptoms: symptoms.to_string(),
    }
}

impl TumorCatalog {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, TumorInfo)>,
        S: AsRef<str>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(label, info)| (catalog_key(label.as_ref()), info))
                .collect(),
        }
    }

    pub fn get(&self, label: &str) -> Option<&TumorInfo> {
        self.entries.get(&catalog_key(label))
    }

    pub fn contains(&self, label: &str) -> bool {
        self.get(label).is_some()
    }

    /// Labels from `labels` that have no entry.
    pub fn missing<'a>(&self, labels: &'a [String]) -> Vec<&'a str> {
        labels
            .iter()
            .map(String::as_str)
            .filter(|label| !self.contains(label))
            .collect()
    }
}

impl Default for TumorCatalog {
    fn default() -> Self {
        Self::new([
            (
                "glioma",
                info(
                    "High Risk",
                    "Aggressive tumor originating from glial cells.",
                    "Headache, seizures, vision problems",
                ),
            ),
            (
                "meningioma",
                info(
                    "Medium Risk",
                    "Slow growing tumor from brain membranes.",
                    "Vision issues, headache",
                ),
            ),
            (
                "pituitary",
                info(
                    "Low Risk",
                    "Tumor in pituitary gland affecting hormones.",
                    "Hormonal imbalance",
                ),
            ),
            ("notumor", info("No Risk", "No abnormality detected.", "None")),
            (
                UNRECOGNIZED_LABEL,
                info(
                    "Undetermined",
                    "The image could not be matched to a known category with sufficient confidence. Please upload a clear brain MRI scan.",
                    "N/A",
                ),
            ),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_spellings_resolve_to_same_entry() {
        let catalog = TumorCatalog::default();
        let a = catalog.get("no_tumor").unwrap();
        let b = catalog.get("notumor").unwrap();
        let c = catalog.get("No Tumor").unwrap();
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(a.risk_level, "No Risk");
    }

    #[test]
    fn test_sentinel_has_entry() {
        let catalog = TumorCatalog::default();
        assert_eq!(catalog.get(UNRECOGNIZED_LABEL).unwrap().risk_level, "Undetermined");
    }

    #[test]
    fn test_unknown_label_is_none() {
        assert!(TumorCatalog::default().get("astrocytoma").is_none());
    }

    #[test]
    fn test_missing_labels() {
        let catalog = TumorCatalog::default();
        let labels = vec!["glioma".to_string(), "tumor".to_string()];
        assert_eq!(catalog.missing(&labels), vec!["tumor"]);
    }
}
