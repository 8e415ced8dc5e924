use std::sync::OnceLock;

use regex::Regex;
use uuid::Uuid;

pub const UNKNOWN_CONTACT: &str = "Unknown Contact";

/// Separator placed between vCards in the combined batch output.
const CARD_SEPARATOR: &str = "\n\n";

/// One converted contact held in the batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactRecord {
    pub id: Uuid,
    pub original_text: String,
    pub vcard: String,
    pub display_name: String,
}

impl ContactRecord {
    pub fn new(original_text: impl Into<String>, vcard: impl Into<String>) -> Self {
        let vcard = vcard.into();
        let display_name = extract_display_name(&vcard);
        Self {
            id: Uuid::new_v4(),
            original_text: original_text.into(),
            vcard,
            display_name,
        }
    }
}

/// Ordered collection of converted contacts plus their combined vCard text.
///
/// `combined` is rebuilt after every mutation so it always matches `records`.
#[derive(Debug, Default, Clone)]
pub struct Batch {
    records: Vec<ContactRecord>,
    combined: String,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, record: ContactRecord) -> Uuid {
        let id = record.id;
        self.records.push(record);
        self.rebuild();
        id
    }

    /// Remove the record with `id`. Unknown ids are ignored.
    pub fn remove(&mut self, id: Uuid) -> bool {
        let before = self.records.len();
        self.records.retain(|record| record.id != id);
        self.rebuild();
        self.records.len() != before
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.combined.clear();
    }

    pub fn get(&self, id: Uuid) -> Option<&ContactRecord> {
        self.records.iter().find(|record| record.id == id)
    }

    pub fn records(&self) -> &[ContactRecord] {
        &self.records
    }

    pub fn combined(&self) -> &str {
        &self.combined
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn rebuild(&mut self) {
        self.combined = self
            .records
            .iter()
            .map(|record| record.vcard.as_str())
            .collect::<Vec<_>>()
            .join(CARD_SEPARATOR);
    }
}

fn fn_line_regex() -> &'static Regex {
    static FN_LINE: OnceLock<Regex> = OnceLock::new();
    FN_LINE.get_or_init(|| {
        Regex::new(r"(?mi)^FN(?:;[^:\r\n]*)?:(.+)$").expect("FN pattern is valid")
    })
}

/// Name shown for a vCard in the batch list: the first `FN` value, or
/// `UNKNOWN_CONTACT`.
pub fn extract_display_name(vcard: &str) -> String {
    fn_line_regex()
        .captures(vcard)
        .and_then(|caps| caps.get(1))
        .map(|value| value.as_str().trim())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| UNKNOWN_CONTACT.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(name: &str) -> String {
        format!("BEGIN:VCARD\nVERSION:3.0\nFN:{}\nEND:VCARD", name)
    }

    #[test]
    fn test_extract_display_name() {
        assert_eq!(extract_display_name(&card("Jane Doe")), "Jane Doe");
        assert_eq!(
            extract_display_name("BEGIN:VCARD\r\nFN:  Li Lei \r\nEND:VCARD"),
            "Li Lei"
        );
        assert_eq!(
            extract_display_name("BEGIN:VCARD\nFN;CHARSET=UTF-8:张三\nEND:VCARD"),
            "张三"
        );
    }

    #[test]
    fn test_extract_display_name_takes_first_match() {
        let text = format!("{}\n\n{}", card("First"), card("Second"));
        assert_eq!(extract_display_name(&text), "First");
    }

    #[test]
    fn test_extract_display_name_fallback() {
        assert_eq!(
            extract_display_name("BEGIN:VCARD\nN:Doe;Jane;;;\nEND:VCARD"),
            UNKNOWN_CONTACT
        );
        assert_eq!(extract_display_name("FN:   \n"), UNKNOWN_CONTACT);
        assert_eq!(extract_display_name(""), UNKNOWN_CONTACT);
    }

    #[test]
    fn test_structured_name_is_not_mistaken_for_fn() {
        // `N:` must not match, and neither must a property that merely ends in FN.
        let text = "BEGIN:VCARD\nN:Doe;Jane;;;\nX-FN:Nope\nEND:VCARD";
        assert_eq!(extract_display_name(text), UNKNOWN_CONTACT);
    }

    #[test]
    fn test_add_remove_preserves_order() {
        let mut batch = Batch::new();
        let r1 = batch.add(ContactRecord::new("one", card("One")));
        let r2 = batch.add(ContactRecord::new("two", card("Two")));
        let r3 = batch.add(ContactRecord::new("three", card("Three")));
        assert_eq!(batch.len(), 3);

        assert!(batch.remove(r2));
        assert_eq!(
            batch.combined(),
            format!("{}\n\n{}", card("One"), card("Three"))
        );
        let ids: Vec<Uuid> = batch.records().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![r1, r3]);
    }

    #[test]
    fn test_remove_unknown_id_is_noop() {
        let mut batch = Batch::new();
        batch.add(ContactRecord::new("one", card("One")));
        let before = batch.combined().to_string();

        assert!(!batch.remove(Uuid::new_v4()));
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.combined(), before);
    }

    #[test]
    fn test_clear_is_idempotent() {
        let mut batch = Batch::new();
        batch.add(ContactRecord::new("one", card("One")));
        batch.add(ContactRecord::new("two", card("Two")));

        batch.clear();
        assert!(batch.is_empty());
        assert_eq!(batch.combined(), "");

        batch.clear();
        assert!(batch.is_empty());
        assert_eq!(batch.combined(), "");
    }

    #[test]
    fn test_record_ids_are_unique() {
        let mut batch = Batch::new();
        let a = batch.add(ContactRecord::new("same", card("Same")));
        let b = batch.add(ContactRecord::new("same", card("Same")));
        assert_ne!(a, b);
        assert_eq!(batch.get(a).unwrap().display_name, "Same");
        assert_eq!(batch.get(b).unwrap().original_text, "same");
    }

    #[test]
    fn test_single_record_has_no_separator() {
        let mut batch = Batch::new();
        batch.add(ContactRecord::new("one", card("One")));
        assert_eq!(batch.combined(), card("One"));
    }
}
