//! Реестр стендов.
//!
//! Стенды создаются один раз из статической таблицы и дальше только
//! мутируются на месте: обогащение из каталога (цена, описание, продукты),
//! пометка занятых по данным API и завершение бронирования.
//! Выбор (`SelectionSet`) хранит только идентификаторы, поэтому любое
//! изменение статуса здесь сразу видно подсветке и проверке доступности.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::models::booth::{self, static_designs};
use crate::models::{ApiProduct, Booth, BoothDesign, BoothId, BoothStatus, SizeKey};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Invalid booth id in registry table: {0:?}")]
    InvalidId(String),

    #[error("Duplicate booth id: {0}")]
    DuplicateId(BoothId),

    #[error("Booth {id} references unknown category {category}")]
    UnknownCategory { id: BoothId, category: u8 },

    #[error("Booth {id} declares size {size} but category {category} is {expected}")]
    CategorySizeMismatch { id: BoothId, category: u8, size: String, expected: String },

    #[error("Booth not found: {0}")]
    NotFound(BoothId),
}

// (id, category, size, location) - план выставки ISCA 2026
const INITIAL_BOOTHS: [(&str, u8, &str, &str); 54] = [
    ("01", 4, "9mx3m", "Foyer 1A"),
    ("02", 4, "9mx3m", "Foyer 1A"),
    ("03", 4, "9mx3m", "Foyer 1C"),
    ("04", 4, "9mx3m", "Foyer 1C"),
    ("05", 4, "9mx3m", "No Man's Land"),
    ("06", 1, "3mx2m", "AD11&AD12 Exhibition"),
    ("07", 1, "3mx2m", "AD11&AD12 Exhibition"),
    ("08", 1, "3mx2m", "AD11&AD12 Exhibition"),
    ("09", 1, "3mx2m", "AD11&AD12 Exhibition"),
    ("10", 1, "3mx2m", "AD11&AD12 Exhibition"),
    ("11", 1, "3mx2m", "AD11&AD12 Exhibition"),
    ("12", 1, "3mx2m", "AD11&AD12 Exhibition"),
    ("13", 1, "3mx2m", "AD11&AD12 Exhibition"),
    ("14", 1, "3mx2m", "AD11&AD12 Exhibition"),
    ("15", 1, "3mx2m", "AD11&AD12 Exhibition"),
    ("16", 1, "3mx2m", "AD11&AD12 Exhibition"),
    ("17", 1, "3mx2m", "AD11&AD12 Exhibition"),
    ("18", 1, "3mx2m", "AD11&AD12 Exhibition"),
    ("19", 1, "3mx2m", "AD11&AD12 Exhibition"),
    ("20", 1, "3mx2m", "AD11&AD12 Exhibition"),
    ("21", 5, "12mx3m", "AD11&AD12 Exhibition"),
    ("22", 5, "12mx3m", "Concourse"),
    ("23", 3, "6mx3m", "Concourse"),
    ("24", 3, "6mx3m", "Concourse"),
    ("25", 3, "6mx3m", "Concourse"),
    ("26", 5, "12mx3m", "Concourse"),
    ("27", 3, "6mx3m", "Concourse"),
    ("28", 3, "6mx3m", "Concourse"),
    ("29", 3, "6mx3m", "Concourse"),
    ("30", 4, "9mx3m", "Square Tent"),
    ("31", 4, "9mx3m", "Square Tent"),
    ("32", 2, "3mx3m", "Square Tent"),
    ("33", 2, "3mx3m", "Square Tent"),
    ("34", 2, "3mx3m", "Square Tent"),
    ("35", 2, "3mx3m", "Square Tent"),
    ("36", 2, "3mx3m", "Square Tent"),
    ("37", 2, "3mx3m", "Square Tent"),
    ("38", 2, "3mx3m", "Square Tent"),
    ("39", 2, "3mx3m", "Square Tent"),
    ("40", 2, "3mx3m", "Square Tent"),
    ("41", 2, "3mx3m", "Square Tent"),
    ("42", 4, "9mx3m", "Square Tent"),
    ("43", 4, "9mx3m", "Square Tent"),
    ("44", 6, "10mx10m", "Square Tent"),
    ("45", 6, "10mx10m", "Square Tent"),
    ("46", 3, "6mx3m", "Roundabout Tent"),
    ("47", 3, "6mx3m", "Roundabout Tent"),
    ("48", 3, "6mx3m", "Roundabout Tent"),
    ("49", 3, "6mx3m", "Roundabout Tent"),
    ("50", 3, "6mx3m", "Roundabout Tent"),
    ("51", 3, "6mx3m", "Roundabout Tent"),
    ("52", 3, "6mx3m", "Roundabout Tent"),
    ("53", 3, "6mx3m", "Roundabout Tent"),
    ("54", 5, "12mx3m", "Roundabout Tent"),
];

/// Итог слияния каталога с реестром.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EnrichReport {
    pub matched_by_id: usize,
    pub matched_by_size: usize,
    /// Стенды, для которых подошло больше одного продукта.
    pub ambiguous: usize,
    pub unmatched: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MarkReport {
    pub newly_booked: Vec<BoothId>,
    pub unknown: Vec<String>,
    pub skipped: Vec<BoothId>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    pub total: usize,
    pub available: usize,
    pub booked: usize,
    pub reserved: usize,
}

/// Фильтр для списка стендов (боковая панель).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BoothFilter {
    #[serde(default)]
    pub statuses: Vec<BoothStatus>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    #[serde(default)]
    pub sizes: Vec<String>,
    pub category: Option<u8>,
    pub query: Option<String>,
}

impl BoothFilter {
    pub fn matches(&self, booth: &Booth) -> bool {
        if !self.statuses.is_empty() && !self.statuses.contains(&booth.status) {
            return false;
        }
        if let Some(cat) = self.category {
            if booth.category != cat {
                return false;
            }
        }
        if self.min_price.is_some() || self.max_price.is_some() {
            // стенды без цены под ценовой фильтр не попадают
            let Some(price) = booth.price else { return false };
            if self.min_price.is_some_and(|min| price < min) || self.max_price.is_some_and(|max| price > max) {
                return false;
            }
        }
        if !self.sizes.is_empty() {
            let key = booth.size_key();
            if !self.sizes.iter().any(|s| SizeKey::parse(s) == key) {
                return false;
            }
        }
        if let Some(q) = self.query.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            let q = q.to_lowercase();
            let hit = booth.id.as_str().contains(&q)
                || booth.location.to_lowercase().contains(&q)
                || booth.size.to_lowercase().contains(&q);
            if !hit {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone)]
pub struct BoothRegistry {
    booths: BTreeMap<BoothId, Booth>,
}

impl BoothRegistry {
    /// Заполняет реестр из статической таблицы.
    /// `strict` превращает несоответствие категории и размера в ошибку,
    /// иначе это только предупреждение в лог.
    pub fn initialize(strict: bool) -> Result<Self, RegistryError> {
        let rows = INITIAL_BOOTHS.iter().map(|(id, cat, size, loc)| (*id, *cat, *size, *loc));
        Self::from_rows(rows, strict)
    }

    pub fn from_rows<'a>(
        rows: impl IntoIterator<Item = (&'a str, u8, &'a str, &'a str)>,
        strict: bool,
    ) -> Result<Self, RegistryError> {
        let mut booths = BTreeMap::new();
        for (raw_id, category, size, location) in rows {
            // в таблице id должен быть уже нормализован
            let id = BoothId::parse(raw_id)
                .filter(|id| id.as_str() == raw_id)
                .ok_or_else(|| RegistryError::InvalidId(raw_id.to_string()))?;
            let cat = booth::category(category)
                .ok_or_else(|| RegistryError::UnknownCategory { id: id.clone(), category })?;
            if SizeKey::parse(cat.size) != SizeKey::parse(size) {
                let err = RegistryError::CategorySizeMismatch {
                    id: id.clone(),
                    category,
                    size: size.to_string(),
                    expected: cat.size.to_string(),
                };
                if strict {
                    return Err(err);
                }
                warn!("Registry data entry issue: {}", err);
            }
            if booths.contains_key(&id) {
                return Err(RegistryError::DuplicateId(id));
            }
            booths.insert(id.clone(), Booth::new(id, category, size, location));
        }
        info!("Booth registry initialized with {} booths", booths.len());
        Ok(Self { booths })
    }

    pub fn get(&self, id: &BoothId) -> Option<&Booth> {
        self.booths.get(id)
    }

    /// Все стенды в порядке номеров ("01" < "02" < ... < "54").
    pub fn iter(&self) -> impl Iterator<Item = &Booth> {
        self.booths.values()
    }

    pub fn len(&self) -> usize {
        self.booths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.booths.is_empty()
    }

    pub fn filter<'a>(&'a self, filter: &'a BoothFilter) -> impl Iterator<Item = &'a Booth> + 'a {
        self.booths.values().filter(move |b| filter.matches(b))
    }

    pub fn stats(&self) -> RegistryStats {
        self.booths.values().fold(RegistryStats::default(), |mut s, b| {
            s.total += 1;
            match b.status {
                BoothStatus::Available => s.available += 1,
                BoothStatus::Booked => s.booked += 1,
                BoothStatus::Reserved => s.reserved += 1,
            }
            s
        })
    }

    /// Сливает продукты каталога со стендами: сначала по явному списку
    /// номеров, иначе по нормализованному размеру. Первый кандидат
    /// задаёт цену, остальные остаются альтернативными дизайнами.
    pub fn enrich(&mut self, products: &[ApiProduct]) -> EnrichReport {
        let mut by_size: HashMap<SizeKey, Vec<&ApiProduct>> = HashMap::new();
        for product in products {
            if let Some(key) = SizeKey::parse(&product.sizes) {
                by_size.entry(key).or_default().push(product);
            }
        }
        debug!("Catalog size groups: {:?}", by_size.iter().map(|(k, v)| (k.to_string(), v.len())).collect::<Vec<_>>());

        let mut report = EnrichReport::default();
        for booth in self.booths.values_mut() {
            let direct: Vec<&ApiProduct> = products
                .iter()
                .filter(|p| {
                    p.booth_numbers
                        .as_ref()
                        .is_some_and(|nums| nums.iter().any(|n| BoothId::parse(n).as_ref() == Some(&booth.id)))
                })
                .collect();

            let matched = if !direct.is_empty() {
                report.matched_by_id += 1;
                direct
            } else if let Some(candidates) = booth.size_key().and_then(|k| by_size.get(&k)) {
                report.matched_by_size += 1;
                candidates.clone()
            } else {
                report.unmatched += 1;
                continue;
            };

            if matched.len() > 1 {
                report.ambiguous += 1;
            }
            let primary = matched[0];
            if let Some(price) = primary.price() {
                booth.price = Some(price);
            }
            booth.product_id = primary.id.clone();
            booth.product_code = Some(primary.product_code.clone()).filter(|c| !c.is_empty());
            booth.description = Some(primary.description_english.clone()).filter(|d| !d.is_empty());
            booth.products = matched.into_iter().cloned().collect();
        }

        info!(
            "Catalog enrichment: {} by id, {} by size, {} ambiguous, {} unmatched",
            report.matched_by_id, report.matched_by_size, report.ambiguous, report.unmatched
        );
        report
    }

    /// Помечает занятыми стенды из ответа "booked booths".
    pub fn mark_booked<S: AsRef<str>>(&mut self, raw_ids: &[S]) -> MarkReport {
        self.force_status(raw_ids, BoothStatus::Booked)
    }

    /// Административный резерв.
    pub fn mark_reserved<S: AsRef<str>>(&mut self, raw_ids: &[S]) -> MarkReport {
        self.force_status(raw_ids, BoothStatus::Reserved)
    }

    fn force_status<S: AsRef<str>>(&mut self, raw_ids: &[S], status: BoothStatus) -> MarkReport {
        let mut report = MarkReport::default();
        for raw in raw_ids {
            let raw = raw.as_ref();
            let Some(booth) = BoothId::parse(raw).and_then(|id| self.booths.get_mut(&id)) else {
                debug!("Ignoring unknown booth id {:?} from availability data", raw);
                report.unknown.push(raw.to_string());
                continue;
            };
            match booth.status {
                BoothStatus::Available => {
                    booth.status = status;
                    report.newly_booked.push(booth.id.clone());
                }
                current if current == status => {}
                current => {
                    warn!("Booth {} is {}, not changing to {}", booth.id, current.as_str(), status.as_str());
                    report.skipped.push(booth.id.clone());
                }
            }
        }
        report
    }

    /// Фиксирует завершённое бронирование. Возвращает стенды,
    /// которые к этому моменту уже не были свободны.
    pub fn complete_booking(
        &mut self,
        ids: &[BoothId],
        occupant: &str,
        designs: &HashMap<BoothId, BoothDesign>,
    ) -> Result<Vec<BoothId>, RegistryError> {
        if let Some(missing) = ids.iter().find(|id| !self.booths.contains_key(*id)) {
            return Err(RegistryError::NotFound(missing.clone()));
        }
        let mut conflicts = Vec::new();
        for id in ids {
            let Some(booth) = self.booths.get_mut(id) else { continue };
            if !booth.is_available() {
                warn!("Booth {} was already {} when booking completed", id, booth.status.as_str());
                conflicts.push(id.clone());
                continue;
            }
            booth.status = BoothStatus::Booked;
            booth.booked_by = Some(occupant.to_string());
            if let Some(design) = designs.get(id) {
                booth.design_id = Some(design.id.clone());
                booth.design_price = Some(design.price);
            }
        }
        Ok(conflicts)
    }

    /// Дизайны, доступные стенду: баннеры всех подошедших продуктов,
    /// иначе статические шаблоны того же размера.
    pub fn designs_for(&self, id: &BoothId) -> Vec<BoothDesign> {
        let Some(booth) = self.booths.get(id) else {
            return Vec::new();
        };
        let mut designs = Vec::new();
        for (index, product) in booth.products.iter().enumerate() {
            let price = product.price().or(booth.price).unwrap_or(0.0);
            let name = if product.name_english.is_empty() {
                format!("Design {}", index + 1)
            } else {
                product.name_english.clone()
            };
            let description = Some(product.description_english.clone()).filter(|d| !d.is_empty());
            if let Some(banner) = product.banner.as_ref().filter(|b| !b.is_empty()) {
                let id = if product.product_code.is_empty() {
                    format!("banner-{}", index + 1)
                } else {
                    product.product_code.clone()
                };
                designs.push(BoothDesign {
                    id,
                    name,
                    size: booth.size.clone(),
                    image_path: banner.clone(),
                    price,
                    description,
                });
            } else if let Some(banners) = product.banners.as_ref() {
                for (i, banner) in banners.iter().enumerate() {
                    designs.push(BoothDesign {
                        id: banner.id.clone().unwrap_or_else(|| format!("banner-{}-{}", index + 1, i)),
                        name: name.clone(),
                        size: booth.size.clone(),
                        image_path: banner.banner.clone(),
                        price,
                        description: banner.description.clone().or_else(|| description.clone()),
                    });
                }
            }
        }
        if designs.is_empty() {
            let key = booth.size_key();
            designs = static_designs().into_iter().filter(|d| d.size_key() == key).collect();
        }
        designs
    }

    pub fn find_design(&self, id: &BoothId, design_id: &str) -> Option<BoothDesign> {
        self.designs_for(id).into_iter().find(|d| d.id == design_id)
    }
}

/// Общий реестр процесса плюс счётчик версий для подписчиков (сессий).
#[derive(Clone)]
pub struct SharedRegistry {
    inner: Arc<RwLock<BoothRegistry>>,
    version: watch::Sender<u64>,
}

impl SharedRegistry {
    pub fn new(registry: BoothRegistry) -> Self {
        let (version, _) = watch::channel(0);
        Self { inner: Arc::new(RwLock::new(registry)), version }
    }

    pub fn read(&self) -> RwLockReadGuard<'_, BoothRegistry> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Мутация реестра; подписчики узнают о ней через `subscribe()`.
    pub fn update<R>(&self, f: impl FnOnce(&mut BoothRegistry) -> R) -> R {
        let result = {
            let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
            f(&mut guard)
        };
        self.version.send_modify(|v| *v += 1);
        result
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }

    pub fn version(&self) -> u64 {
        *self.version.borrow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn product(code: &str, sizes: &str, price: &str) -> ApiProduct {
        ApiProduct {
            product_code: code.into(),
            name_english: format!("Package {code}"),
            sizes: sizes.into(),
            prices: price.into(),
            ..Default::default()
        }
    }

    #[test]
    fn initial_ids_are_unique_and_two_digits() {
        let reg = BoothRegistry::initialize(true).unwrap();
        assert_eq!(reg.len(), 54);
        let ids: HashSet<_> = reg.iter().map(|b| b.id.clone()).collect();
        assert_eq!(ids.len(), reg.len());
        assert!(reg.iter().all(|b| b.id.as_str().len() == 2 && b.id.as_str().chars().all(|c| c.is_ascii_digit())));
        assert!(reg.iter().all(|b| b.is_available()));
    }

    #[test]
    fn duplicate_and_malformed_rows_fail_loudly() {
        let dup = BoothRegistry::from_rows([("01", 1, "3mx2m", "A"), ("01", 1, "3mx2m", "B")], false);
        assert!(matches!(dup, Err(RegistryError::DuplicateId(_))));
        let bad = BoothRegistry::from_rows([("1", 1, "3mx2m", "A")], false);
        assert!(matches!(bad, Err(RegistryError::InvalidId(_))));
        let cat = BoothRegistry::from_rows([("01", 9, "3mx2m", "A")], false);
        assert!(matches!(cat, Err(RegistryError::UnknownCategory { .. })));
    }

    #[test]
    fn category_size_mismatch_is_strict_only() {
        let rows = [("01", 1, "9mx3m", "A")];
        assert!(BoothRegistry::from_rows(rows, false).is_ok());
        assert!(matches!(
            BoothRegistry::from_rows(rows, true),
            Err(RegistryError::CategorySizeMismatch { .. })
        ));
    }

    #[test]
    fn enrich_prefers_explicit_booth_numbers() {
        let mut reg = BoothRegistry::initialize(true).unwrap();
        let mut vip = product("VIP", "9m*3m", "9000");
        vip.booth_numbers = Some(vec!["1".into()]);
        let generic = product("GEN", "3m*9m", "7000");
        let report = reg.enrich(&[vip, generic]);

        let b01 = reg.get(&BoothId::parse("01").unwrap()).unwrap();
        assert_eq!(b01.price, Some(9000.0));
        assert_eq!(b01.product_code.as_deref(), Some("VIP"));
        assert_eq!(b01.products.len(), 1);

        // "02" тоже 9x3, но без явной привязки - совпадение по размеру (оба продукта)
        let b02 = reg.get(&BoothId::parse("02").unwrap()).unwrap();
        assert_eq!(b02.price, Some(9000.0));
        assert_eq!(b02.products.len(), 2);
        assert_eq!(report.matched_by_id, 1);
        assert!(report.ambiguous >= 1);
    }

    #[test]
    fn enrich_by_size_keeps_alternatives_and_first_price() {
        let mut reg = BoothRegistry::initialize(true).unwrap();
        let mut a = product("A", "2m*3m", "1500");
        a.banner = Some("/a.png".into());
        let mut b = product("B", "3mx2m", "1800");
        b.banner = Some("/b.png".into());
        reg.enrich(&[a, b]);

        let id = BoothId::parse("06").unwrap();
        assert_eq!(reg.get(&id).unwrap().price, Some(1500.0));
        let designs = reg.designs_for(&id);
        assert_eq!(designs.iter().map(|d| d.id.as_str()).collect::<Vec<_>>(), vec!["A", "B"]);
        assert_eq!(designs[1].price, 1800.0);
    }

    #[test]
    fn unparseable_price_keeps_static_default() {
        let mut reg = BoothRegistry::initialize(true).unwrap();
        reg.enrich(&[product("X", "3m*3m", "call us")]);
        let b = reg.get(&BoothId::parse("32").unwrap()).unwrap();
        assert_eq!(b.price, None);
        assert_eq!(b.product_code.as_deref(), Some("X"));
    }

    #[test]
    fn designs_fall_back_to_static_catalog() {
        let reg = BoothRegistry::initialize(true).unwrap();
        let designs = reg.designs_for(&BoothId::parse("32").unwrap());
        assert_eq!(designs.len(), 2);
        assert!(designs.iter().all(|d| d.size == "3mx3m"));
    }

    #[test]
    fn mark_booked_normalizes_and_never_reopens() {
        let mut reg = BoothRegistry::initialize(true).unwrap();
        reg.mark_reserved(&["7"]);
        let report = reg.mark_booked(&["5", "07", "99", "junk"]);
        assert_eq!(report.newly_booked, vec![BoothId::parse("05").unwrap()]);
        assert_eq!(report.skipped, vec![BoothId::parse("07").unwrap()]);
        assert_eq!(report.unknown, vec!["99".to_string(), "junk".to_string()]);
        assert_eq!(reg.get(&BoothId::parse("05").unwrap()).unwrap().status, BoothStatus::Booked);
        assert_eq!(reg.get(&BoothId::parse("07").unwrap()).unwrap().status, BoothStatus::Reserved);
    }

    #[test]
    fn complete_booking_records_occupant_and_design() {
        let mut reg = BoothRegistry::initialize(true).unwrap();
        let a = BoothId::parse("06").unwrap();
        let b = BoothId::parse("05").unwrap();
        reg.mark_booked(&["05"]);
        let design = reg.designs_for(&a).remove(0);
        let designs = HashMap::from([(a.clone(), design.clone())]);
        let conflicts = reg.complete_booking(&[a.clone(), b.clone()], "ACME", &designs).unwrap();
        assert_eq!(conflicts, vec![b]);
        let booth = reg.get(&a).unwrap();
        assert_eq!(booth.status, BoothStatus::Booked);
        assert_eq!(booth.booked_by.as_deref(), Some("ACME"));
        assert_eq!(booth.design_id.as_deref(), Some(design.id.as_str()));
    }

    #[test]
    fn filter_by_status_price_size_and_query() {
        let mut reg = BoothRegistry::initialize(true).unwrap();
        reg.enrich(&[product("S", "3m*3m", "4000")]);
        reg.mark_booked(&["32"]);

        let filter = BoothFilter {
            statuses: vec![BoothStatus::Available],
            sizes: vec!["3x3".into()],
            min_price: Some(3000.0),
            ..Default::default()
        };
        let ids: Vec<_> = reg.filter(&filter).map(|b| b.id.to_string()).collect();
        assert_eq!(ids.len(), 9);
        assert!(!ids.contains(&"32".to_string()));

        let filter = BoothFilter { query: Some("roundabout".into()), ..Default::default() };
        assert_eq!(reg.filter(&filter).count(), 9);

        let stats = reg.stats();
        assert_eq!(stats.total, 54);
        assert_eq!(stats.booked, 1);
        assert_eq!(stats.available, 53);
    }

    #[test]
    fn shared_registry_bumps_version_on_update() {
        let shared = SharedRegistry::new(BoothRegistry::initialize(true).unwrap());
        let rx = shared.subscribe();
        shared.update(|r| r.mark_booked(&["10"]));
        assert_eq!(*rx.borrow(), 1);
        assert_eq!(shared.read().stats().booked, 1);
    }
}
