use serde::{Deserialize, Deserializer, Serialize};

/// Баннер продукта (если API отдаёт массив баннеров).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiProductBanner {
    #[serde(default)]
    pub id: Option<String>,
    pub banner: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Продукт каталога выставки ("пакет" стенда).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ApiProduct {
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub id: Option<String>,
    #[serde(default)]
    pub name_english: String,
    #[serde(default)]
    pub name_french: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub quantity: String,
    #[serde(default)]
    pub product_code: String,
    #[serde(default)]
    pub sizes: String,
    #[serde(default)]
    pub description_english: String,
    #[serde(default)]
    pub description_french: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub prices: String,
    #[serde(default)]
    pub banner: Option<String>,
    #[serde(default)]
    pub banners: Option<Vec<ApiProductBanner>>,
    #[serde(default)]
    pub booth_numbers: Option<Vec<String>>,
}

impl ApiProduct {
    /// Цена приходит строкой ("1500", "1,500.00"); мусор -> None.
    pub fn price(&self) -> Option<f64> {
        let cleaned: String = self.prices.chars().filter(|c| *c != ',' && !c.is_whitespace()).collect();
        cleaned.parse::<f64>().ok().filter(|p| p.is_finite())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentMethod {
    #[serde(deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(default, rename = "contentEnglish")]
    pub content_english: String,
    #[serde(default, rename = "contentFrench")]
    pub content_french: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiEvent {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub email: String,
}

/// Ответ "list packages".
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PackagesResponse {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub event: Option<ApiEvent>,
    #[serde(default)]
    pub products: Vec<ApiProduct>,
    #[serde(default)]
    pub payment_method: Option<Vec<PaymentMethod>>,
}

/// Ответ "product details by id" - нас интересуют только способы оплаты.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductDetails {
    #[serde(default)]
    pub payment_method: Option<Vec<PaymentMethod>>,
}

/// Табличный ответ "booked booths": строки - массивы ячеек.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookingsResponse {
    #[serde(default)]
    pub message: String,
    #[serde(default, rename = "recordsTotal")]
    pub records_total: u64,
    #[serde(default)]
    pub data: Vec<Vec<serde_json::Value>>,
}

/// Колонка с номерами стендов в строке бронирования ("06,07,08").
pub const BOOKED_BOOTHS_COLUMN: usize = 14;

impl BookingsResponse {
    pub fn booth_numbers(&self) -> Vec<String> {
        self.data
            .iter()
            .filter_map(|row| row.get(BOOKED_BOOTHS_COLUMN))
            .filter_map(|cell| cell.as_str())
            .flat_map(|joined| joined.split(','))
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .map(str::to_string)
            .collect()
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_opt_string(deserializer)?.unwrap_or_default())
}

// API иногда отдаёт числа вместо строк
fn lenient_opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}
