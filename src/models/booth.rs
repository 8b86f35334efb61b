use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

use crate::models::catalog::ApiProduct;

// Метка стенда на карте: строго одна или две цифры
static LABEL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{1,2}$").expect("static label pattern"));

// "3mx2m", "2m*3m", "3 x 2", "10mx10m"
static SIZE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s*m?\s*[xX*×]\s*(\d+)").expect("static size pattern"));

/// Идентификатор стенда: всегда ровно две цифры ("06", "42").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BoothId(String);

impl BoothId {
    /// Нормализует метку с карты или из API: "6" -> "06", " 42 " -> "42".
    /// Всё, что не является числом из 1-2 цифр, отбрасывается.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if !LABEL_PATTERN.is_match(trimmed) {
            return None;
        }
        Some(BoothId(format!("{:0>2}", trimmed)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BoothId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for BoothId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        BoothId::parse(&value).ok_or_else(|| format!("invalid booth id: {value:?}"))
    }
}

impl From<BoothId> for String {
    fn from(id: BoothId) -> Self {
        id.0
    }
}

/// Жизненный цикл стенда. Возврата в `Available` нет.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoothStatus {
    Available,
    Booked,
    Reserved,
}

impl BoothStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BoothStatus::Available => "available",
            BoothStatus::Booked => "booked",
            BoothStatus::Reserved => "reserved",
        }
    }
}

/// Нормализованный размер: большая сторона первой, формат строки не важен.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SizeKey {
    pub major: u32,
    pub minor: u32,
}

impl SizeKey {
    pub fn parse(raw: &str) -> Option<Self> {
        let caps = SIZE_PATTERN.captures(raw)?;
        let a: u32 = caps.get(1)?.as_str().parse().ok()?;
        let b: u32 = caps.get(2)?.as_str().parse().ok()?;
        Some(SizeKey { major: a.max(b), minor: a.min(b) })
    }
}

impl fmt::Display for SizeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.major, self.minor)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booth {
    pub id: BoothId,
    pub category: u8,
    pub size: String,
    pub location: String,
    pub status: BoothStatus,
    pub price: Option<f64>,
    pub booked_by: Option<String>,
    pub design_id: Option<String>,
    pub design_price: Option<f64>,
    pub product_id: Option<String>,
    pub product_code: Option<String>,
    pub description: Option<String>,
    /// Все подошедшие продукты каталога; первый - основной.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub products: Vec<ApiProduct>,
}

impl Booth {
    pub fn new(id: BoothId, category: u8, size: &str, location: &str) -> Self {
        Self {
            id,
            category,
            size: size.to_string(),
            location: location.to_string(),
            status: BoothStatus::Available,
            price: None,
            booked_by: None,
            design_id: None,
            design_price: None,
            product_id: None,
            product_code: None,
            description: None,
            products: Vec::new(),
        }
    }

    pub fn is_available(&self) -> bool {
        self.status == BoothStatus::Available
    }

    pub fn size_key(&self) -> Option<SizeKey> {
        SizeKey::parse(&self.size)
    }

    pub fn primary_product(&self) -> Option<&ApiProduct> {
        self.products.first()
    }
}

/// Категория стенда - только для легенды и группировки.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoothCategory {
    pub id: u8,
    pub name: &'static str,
    pub size: &'static str,
    pub color: &'static str,
    pub description: &'static str,
}

pub const BOOTH_CATEGORIES: [BoothCategory; 6] = [
    BoothCategory { id: 1, name: "Booth Category 1", size: "3mx2m", color: "#FF69B4", description: "Premium corner booth" },
    BoothCategory { id: 2, name: "Booth Category 2", size: "3mx3m", color: "#87CEEB", description: "Standard booth" },
    BoothCategory { id: 3, name: "Booth Category 3", size: "6mx3m", color: "#FFA500", description: "Large exhibition space" },
    BoothCategory { id: 4, name: "Booth Category 4", size: "9mx3m", color: "#90EE90", description: "Extra large booth" },
    BoothCategory { id: 5, name: "Booth Category 5", size: "12mx3m", color: "#00CED1", description: "Premium large space" },
    BoothCategory { id: 6, name: "Booth Category 6", size: "10mx10m", color: "#FF0000", description: "Special exhibition area" },
];

pub fn category(id: u8) -> Option<&'static BoothCategory> {
    BOOTH_CATEGORIES.iter().find(|c| c.id == id)
}

/// Дизайн-шаблон стенда, выбирается для каждого стенда отдельно.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoothDesign {
    pub id: String,
    pub name: String,
    pub size: String,
    pub image_path: String,
    pub price: f64,
    pub description: Option<String>,
}

impl BoothDesign {
    pub fn size_key(&self) -> Option<SizeKey> {
        SizeKey::parse(&self.size)
    }
}

// (id, name, size, image, price, description)
const STATIC_DESIGNS: [(&str, &str, &str, &str, f64, &str); 19] = [
    ("3x2-1", "Compact Design 1", "3mx2m", "/3x2/design-1.jpeg", 2500.0, "Perfect for small displays"),
    ("3x2-2", "Compact Design 2", "3mx2m", "/3x2/design-2.jpeg", 2600.0, "Modern minimalist layout"),
    ("3x2-3", "Compact Design 3", "3mx2m", "/3x2/design-3.jpeg", 2700.0, "Professional corner booth"),
    ("3x2-4", "Compact Design 4", "3mx2m", "/3x2/design-4.jpeg", 2800.0, "Elegant presentation space"),
    ("3x2-5", "Compact Design 5", "3mx2m", "/3x2/design-5.jpeg", 2900.0, "Contemporary style booth"),
    ("3x2-6", "Compact Design 6", "3mx2m", "/3x2/design-6.jpeg", 3000.0, "Premium compact design"),
    ("3x2-7", "Compact Design 7", "3mx2m", "/3x2/design-7.jpeg", 3100.0, "Dynamic layout option"),
    ("3x2-8", "Compact Design 8", "3mx2m", "/3x2/design-8.jpeg", 3200.0, "Versatile booth setup"),
    ("3x2-9", "Compact Design 9", "3mx2m", "/3x2/design-9.jpeg", 3300.0, "Stylish presentation area"),
    ("3x2-10", "Compact Design 10", "3mx2m", "/3x2/design-10.jpeg", 3400.0, "Premium corner configuration"),
    ("3x3-1", "Standard Design 1", "3mx3m", "/3x3/design-1.jpeg", 4500.0, "Classic exhibition booth"),
    ("3x3-2", "Standard Design 2", "3mx3m", "/3x3/design-2.jpeg", 4800.0, "Professional standard space"),
    ("6x3-1", "Large Design 1", "6mx3m", "/6x3/design-1.jpeg", 7500.0, "Spacious exhibition area"),
    ("6x3-2", "Large Design 2", "6mx3m", "/6x3/design-2.jpeg", 7800.0, "Premium large booth"),
    ("6x3-3", "Large Design 3", "6mx3m", "/6x3/design-3.jpeg", 8100.0, "Deluxe exhibition space"),
    ("6x3-4", "Large Design 4", "6mx3m", "/6x3/design-4.jpeg", 8400.0, "Executive booth layout"),
    ("9x3-1", "Extra Large Design 1", "9mx3m", "/9x3/design-1.jpeg", 11000.0, "Expansive exhibition space"),
    ("10x10-1", "Premium Island Design 1", "10mx10m", "/10x10/design-1.jpeg", 25000.0, "Island booth configuration"),
    ("12x3-1", "Mega Design 1", "12mx3m", "/12x3/design-1.jpeg", 15000.0, "Maximum exhibition impact"),
];

pub fn static_designs() -> Vec<BoothDesign> {
    STATIC_DESIGNS
        .iter()
        .map(|(id, name, size, image, price, description)| BoothDesign {
            id: id.to_string(),
            name: name.to_string(),
            size: size.to_string(),
            image_path: image.to_string(),
            price: *price,
            description: Some(description.to_string()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn booth_ids_are_zero_padded() {
        assert_eq!(BoothId::parse("6").unwrap().as_str(), "06");
        assert_eq!(BoothId::parse(" 42 ").unwrap().as_str(), "42");
        assert!(BoothId::parse("123").is_none());
        assert!(BoothId::parse("A1").is_none());
        assert!(BoothId::parse("").is_none());
    }

    #[test]
    fn size_key_ignores_format_and_orientation() {
        let a = SizeKey::parse("2m*3m").unwrap();
        let b = SizeKey::parse("3mx2m").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "3x2");
        assert_eq!(SizeKey::parse("10mx10m").unwrap().to_string(), "10x10");
        assert_eq!(SizeKey::parse("3x2m 6sqm").unwrap().to_string(), "3x2");
        assert!(SizeKey::parse("large").is_none());
    }

    #[test]
    fn booth_id_deserializes_with_normalization() {
        let id: BoothId = serde_json::from_str("\"7\"").unwrap();
        assert_eq!(id.as_str(), "07");
        assert!(serde_json::from_str::<BoothId>("\"700\"").is_err());
    }

    #[test]
    fn every_category_has_static_designs() {
        let designs = static_designs();
        for cat in BOOTH_CATEGORIES.iter() {
            let key = SizeKey::parse(cat.size);
            assert!(designs.iter().any(|d| d.size_key() == key), "no design for {}", cat.size);
        }
    }
}
