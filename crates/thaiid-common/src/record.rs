//! Decoded card data

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Serialize, Serializer};

use crate::address::{DistrictPrefix, SubdistrictPrefix};

/// Public data read from a Thai national ID card.
///
/// Fields that could not be read stay empty. Dates are Gregorian
/// `YYYY-MM-DD` strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardRecord {
    pub citizen_id: String,
    /// Always empty: the card's name field carries no separate title
    pub prefix_name_th: String,
    pub first_name_th: String,
    /// Always empty, kept so existing clients see the same shape
    pub middle_name_th: String,
    pub last_name_th: String,
    #[serde(rename = "prefixNameEN")]
    pub prefix_name_en: String,
    pub first_name_en: String,
    #[serde(rename = "middleNameEN")]
    pub middle_name_en: String,
    pub last_name_en: String,
    pub date_of_birth: String,
    pub gender: Gender,
    pub address: Option<AddressRecord>,
    pub issue_date: String,
    #[serde(rename = "expireDate")]
    pub expiry_date: String,
    /// JPEG bytes, empty when the card carries no photo
    #[serde(rename = "photoBase64", serialize_with = "serialize_photo")]
    pub photo: Vec<u8>,
}

fn serialize_photo<S: Serializer>(photo: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&STANDARD.encode(photo))
}

/// Cardholder gender as encoded on the card
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    #[default]
    #[serde(rename = "")]
    Unknown,
}

impl Gender {
    /// Map the one-byte gender field: `'1'` male, `'2'` female
    pub fn from_code(data: &[u8]) -> Self {
        match data.first() {
            Some(b'1') => Gender::Male,
            Some(b'2') => Gender::Female,
            _ => Gender::Unknown,
        }
    }
}

/// Structured registered address
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressRecord {
    pub house_no: String,
    pub moo: String,
    pub soi: String,
    pub street: String,
    pub subdistrict: String,
    pub district: String,
    pub province: String,
    /// Rebuilt from the fields above, never copied from the card
    pub full_address: String,
    /// Subdistrict marker seen on the card, reused when rebuilding
    #[serde(skip)]
    pub subdistrict_prefix: SubdistrictPrefix,
    /// District marker seen on the card, reused when rebuilding
    #[serde(skip)]
    pub district_prefix: DistrictPrefix,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gender_from_code() {
        assert_eq!(Gender::from_code(b"1"), Gender::Male);
        assert_eq!(Gender::from_code(b"2"), Gender::Female);
        assert_eq!(Gender::from_code(b"3"), Gender::Unknown);
        assert_eq!(Gender::from_code(b""), Gender::Unknown);
    }

    #[test]
    fn test_record_wire_names() {
        let record = CardRecord {
            citizen_id: "1234567890123".to_string(),
            gender: Gender::Female,
            expiry_date: "2030-01-01".to_string(),
            photo: vec![0xFF, 0xD8, 0xFF, 0xD9],
            ..Default::default()
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["citizenId"], "1234567890123");
        assert_eq!(json["gender"], "female");
        assert_eq!(json["expireDate"], "2030-01-01");
        assert_eq!(json["photoBase64"], "/9j/2Q==");
        assert!(json["address"].is_null());
        assert_eq!(json["firstNameTh"], "");
    }

    #[test]
    fn test_unused_name_parts_serialized_empty() {
        let json = serde_json::to_value(CardRecord::default()).unwrap();

        for key in ["prefixNameTh", "middleNameTh", "prefixNameEN", "middleNameEN"] {
            assert_eq!(json[key], "", "{key}");
        }
        assert_eq!(json.as_object().unwrap().len(), 15);
    }

    #[test]
    fn test_unknown_gender_is_empty_string() {
        let json = serde_json::to_value(CardRecord::default()).unwrap();
        assert_eq!(json["gender"], "");
        assert_eq!(json["photoBase64"], "");
    }

    #[test]
    fn test_address_prefixes_not_serialized() {
        let json = serde_json::to_value(AddressRecord::default()).unwrap();
        let keys: Vec<_> = json.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys.len(), 8);
        assert!(json.get("fullAddress").is_some());
        assert!(json.get("houseNo").is_some());
    }
}
