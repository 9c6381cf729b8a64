//! Contract record accumulated across the harvesting stages
//!
//! A record is created by the listing stage and then enriched in place by the
//! detail, documents and announcements stages. Each enrichment method only
//! ever writes the fields belonging to its own stage.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::contract_url::ContractUrl;

/// Timestamp format used by the detail page (`31.12.2023 14:05`).
pub const TIMESTAMP_FORMAT: &str = "%d.%m.%Y %H:%M";

/// Labelled rows read from the detail page info table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DetailField {
    CreatedAt,
    UpdatedAt,
    Status,
    CpvCodes,
    Kind,
    PublishedAt,
}

impl DetailField {
    pub const ALL: [Self; 6] = [
        Self::CreatedAt,
        Self::UpdatedAt,
        Self::Status,
        Self::CpvCodes,
        Self::Kind,
        Self::PublishedAt,
    ];

    /// Row label as printed on the site, without the trailing colon.
    pub const fn label(self) -> &'static str {
        match self {
            Self::CreatedAt => "Dátum vytvorenia",
            Self::UpdatedAt => "Dátum poslednej aktualizácie",
            Self::Status => "Stav zákazky",
            Self::CpvCodes => "CPV zákazky",
            Self::Kind => "Druh zákazky",
            Self::PublishedAt => "Dátum zverejnenia",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.label() == label)
    }
}

impl fmt::Display for DetailField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The unit of work and the unit of output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractRecord {
    url: ContractUrl,
    pub title: String,
    pub authority: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpv_codes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<String>,
    #[serde(default)]
    pub documents: Vec<String>,
    #[serde(default)]
    pub announcements: Vec<String>,
}

impl ContractRecord {
    /// Seed a record from a listing row. The URL is fixed from here on.
    pub fn new(url: ContractUrl, title: impl Into<String>, authority: impl Into<String>) -> Self {
        Self {
            url,
            title: title.into(),
            authority: authority.into(),
            created_at: None,
            updated_at: None,
            status: None,
            cpv_codes: None,
            kind: None,
            published_at: None,
            documents: Vec::new(),
            announcements: Vec::new(),
        }
    }

    pub fn url(&self) -> &ContractUrl {
        &self.url
    }

    pub fn detail(&self, field: DetailField) -> Option<&str> {
        let value = match field {
            DetailField::CreatedAt => &self.created_at,
            DetailField::UpdatedAt => &self.updated_at,
            DetailField::Status => &self.status,
            DetailField::CpvCodes => &self.cpv_codes,
            DetailField::Kind => &self.kind,
            DetailField::PublishedAt => &self.published_at,
        };
        value.as_deref()
    }

    /// Detail fields still unset, in display order.
    pub fn missing_details(&self) -> Vec<DetailField> {
        DetailField::ALL
            .into_iter()
            .filter(|field| self.detail(*field).is_none())
            .collect()
    }

    /// Fold the fields found on the detail page into this record.
    pub fn apply_detail<I>(&mut self, fields: I)
    where
        I: IntoIterator<Item = (DetailField, String)>,
    {
        for (field, value) in fields {
            let slot = match field {
                DetailField::CreatedAt => &mut self.created_at,
                DetailField::UpdatedAt => &mut self.updated_at,
                DetailField::Status => &mut self.status,
                DetailField::CpvCodes => &mut self.cpv_codes,
                DetailField::Kind => &mut self.kind,
                DetailField::PublishedAt => &mut self.published_at,
            };
            *slot = Some(value);
        }
    }

    pub fn apply_documents(&mut self, documents: Vec<String>) {
        self.documents = documents;
    }

    pub fn apply_announcements(&mut self, announcements: Vec<String>) {
        self.announcements = announcements;
    }

    /// Best available timestamp: last update, then creation, then the minimum sentinel.
    pub fn sort_key(&self) -> NaiveDateTime {
        self.updated_at
            .as_deref()
            .and_then(parse_timestamp)
            .or_else(|| self.created_at.as_deref().and_then(parse_timestamp))
            .unwrap_or(NaiveDateTime::MIN)
    }
}

/// Parse a site timestamp; empty or malformed input yields `None`.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rstest::rstest;

    fn record() -> ContractRecord {
        ContractRecord::new(
            ContractUrl::new("https://www.uvo.gov.sk/vyhladavanie/detail/1"),
            "Dodávka softvéru",
            "Mesto Trnava",
        )
    }

    fn at(day: u32, month: u32, year: i32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|d| d.and_hms_opt(hour, minute, 0))
            .unwrap()
    }

    #[rstest]
    #[case(Some("05.03.2021 08:30"), Some("01.01.2020 10:00"), at(5, 3, 2021, 8, 30))]
    #[case(Some(""), Some("01.01.2020 10:00"), at(1, 1, 2020, 10, 0))]
    #[case(None, Some("01.01.2020 10:00"), at(1, 1, 2020, 10, 0))]
    #[case(Some("garbage"), Some("01.01.2020 10:00"), at(1, 1, 2020, 10, 0))]
    #[case(Some(""), Some(""), NaiveDateTime::MIN)]
    #[case(None, None, NaiveDateTime::MIN)]
    fn sort_key_falls_back(
        #[case] updated: Option<&str>,
        #[case] created: Option<&str>,
        #[case] expected: NaiveDateTime,
    ) {
        let mut r = record();
        r.updated_at = updated.map(str::to_string);
        r.created_at = created.map(str::to_string);
        assert_eq!(r.sort_key(), expected);
    }

    #[test]
    fn apply_detail_sets_only_given_fields() {
        let mut r = record();
        r.apply_detail([
            (DetailField::Status, "Prebieha".to_string()),
            (DetailField::CpvCodes, "48000000-8\n72000000-5".to_string()),
        ]);

        assert_eq!(r.detail(DetailField::Status), Some("Prebieha"));
        assert_eq!(r.detail(DetailField::CpvCodes), Some("48000000-8\n72000000-5"));
        assert_eq!(r.detail(DetailField::CreatedAt), None);
        assert_eq!(r.missing_details().len(), 4);
        assert_eq!(r.title, "Dodávka softvéru");
    }

    #[test]
    fn labels_round_trip() {
        for field in DetailField::ALL {
            assert_eq!(DetailField::from_label(field.label()), Some(field));
        }
        assert_eq!(DetailField::from_label("Neznámy"), None);
    }

    #[test]
    fn snapshot_shape_keeps_identity() {
        let mut r = record();
        r.apply_documents(vec!["Zmluva - zmluva.pdf - 01.01.2020".into()]);
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["url"], "https://www.uvo.gov.sk/vyhladavanie/detail/1");
        assert_eq!(json["documents"][0], "Zmluva - zmluva.pdf - 01.01.2020");
        assert!(json.get("createdAt").is_none());

        let back: ContractRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, r);
    }
}
