//! Корзина: выбранные стенды и дизайн для каждого из них.
//!
//! Хранятся только идентификаторы, данные стенда (статус, цена) всегда
//! читаются из реестра в момент обращения. Поэтому цена, пришедшая из
//! каталога после выбора, сразу попадает в `total_price`.

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

use crate::models::{Booth, BoothDesign, BoothId};
use crate::registry::BoothRegistry;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SelectionError {
    #[error("Booth {0} has already been taken")]
    Unavailable(BoothId),

    #[error("Booth {0} does not exist")]
    Unknown(BoothId),

    #[error("Booth {0} is not selected")]
    NotSelected(BoothId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Toggle {
    Added,
    Removed,
}

/// Строка корзины для клиента.
#[derive(Debug, Clone, Serialize)]
pub struct SelectionLine {
    pub booth: Booth,
    pub design: Option<BoothDesign>,
    pub price: f64,
}

#[derive(Debug, Clone, Default)]
pub struct SelectionSet {
    order: Vec<BoothId>,
    designs: HashMap<BoothId, BoothDesign>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Добавляет стенд в конец корзины или убирает его вместе с дизайном.
    /// Повторное добавление снятого стенда ставит его в конец, выбранный
    /// дизайн при этом не восстанавливается.
    pub fn toggle(&mut self, registry: &BoothRegistry, id: &BoothId) -> Result<Toggle, SelectionError> {
        let booth = registry.get(id).ok_or_else(|| SelectionError::Unknown(id.clone()))?;
        if !booth.is_available() {
            return Err(SelectionError::Unavailable(id.clone()));
        }
        if self.remove(id) {
            Ok(Toggle::Removed)
        } else {
            self.order.push(id.clone());
            Ok(Toggle::Added)
        }
    }

    /// Удаляет стенд и его дизайн. `false`, если стенда не было.
    pub fn remove(&mut self, id: &BoothId) -> bool {
        self.designs.remove(id);
        let before = self.order.len();
        self.order.retain(|x| x != id);
        self.order.len() != before
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.designs.clear();
    }

    pub fn set_design(&mut self, id: &BoothId, design: BoothDesign) -> Result<(), SelectionError> {
        if !self.contains(id) {
            return Err(SelectionError::NotSelected(id.clone()));
        }
        self.designs.insert(id.clone(), design);
        Ok(())
    }

    pub fn design(&self, id: &BoothId) -> Option<&BoothDesign> {
        self.designs.get(id)
    }

    pub fn designs(&self) -> &HashMap<BoothId, BoothDesign> {
        &self.designs
    }

    pub fn contains(&self, id: &BoothId) -> bool {
        self.order.contains(id)
    }

    /// В порядке добавления.
    pub fn ids(&self) -> &[BoothId] {
        &self.order
    }

    pub fn id_set(&self) -> HashSet<BoothId> {
        self.order.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Дизайн выбран для каждого стенда корзины.
    pub fn all_designs_selected(&self) -> bool {
        !self.order.is_empty() && self.order.iter().all(|id| self.designs.contains_key(id))
    }

    fn line_price(&self, registry: &BoothRegistry, id: &BoothId) -> f64 {
        self.designs
            .get(id)
            .map(|d| d.price)
            .or_else(|| registry.get(id).and_then(|b| b.price))
            .unwrap_or(0.0)
    }

    /// Пересчитывается на каждый вызов.
    pub fn total_price(&self, registry: &BoothRegistry) -> f64 {
        self.order.iter().map(|id| self.line_price(registry, id)).sum()
    }

    pub fn lines(&self, registry: &BoothRegistry) -> Vec<SelectionLine> {
        self.order
            .iter()
            .filter_map(|id| {
                let booth = registry.get(id)?.clone();
                Some(SelectionLine {
                    design: self.designs.get(id).cloned(),
                    price: self.line_price(registry, id),
                    booth,
                })
            })
            .collect()
    }

    /// Выбранные стенды, которые успели стать занятыми.
    pub fn unavailable_in(&self, registry: &BoothRegistry) -> Vec<BoothId> {
        self.order
            .iter()
            .filter(|id| registry.get(id).map_or(true, |b| !b.is_available()))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ApiProduct;

    fn id(raw: &str) -> BoothId {
        BoothId::parse(raw).unwrap()
    }

    fn registry() -> BoothRegistry {
        BoothRegistry::initialize(true).unwrap()
    }

    #[test]
    fn toggle_twice_restores_selection() {
        let reg = registry();
        let mut sel = SelectionSet::new();
        sel.toggle(&reg, &id("10")).unwrap();
        assert_eq!(sel.toggle(&reg, &id("11")), Ok(Toggle::Added));
        assert_eq!(sel.toggle(&reg, &id("11")), Ok(Toggle::Removed));
        assert_eq!(sel.ids(), &[id("10")]);
    }

    #[test]
    fn booked_booth_cannot_be_toggled() {
        let mut reg = registry();
        let mut sel = SelectionSet::new();
        reg.mark_booked(&["05"]);
        assert_eq!(sel.toggle(&reg, &id("5")), Err(SelectionError::Unavailable(id("05"))));
        assert!(sel.is_empty());
        assert_eq!(
            SelectionError::Unavailable(id("05")).to_string(),
            "Booth 05 has already been taken"
        );
    }

    #[test]
    fn set_design_requires_membership() {
        let reg = registry();
        let mut sel = SelectionSet::new();
        let design = reg.designs_for(&id("06")).remove(0);
        assert_eq!(sel.set_design(&id("06"), design.clone()), Err(SelectionError::NotSelected(id("06"))));
        assert!(sel.designs().is_empty());
        sel.toggle(&reg, &id("06")).unwrap();
        sel.set_design(&id("06"), design).unwrap();
        assert!(sel.all_designs_selected());
    }

    #[test]
    fn designs_are_per_booth_not_per_size() {
        let reg = registry();
        let mut sel = SelectionSet::new();
        let (a, b) = (id("06"), id("07"));
        let designs = reg.designs_for(&a);
        assert!(designs.len() >= 3);
        sel.toggle(&reg, &a).unwrap();
        sel.toggle(&reg, &b).unwrap();
        sel.set_design(&a, designs[0].clone()).unwrap();
        sel.set_design(&b, designs[2].clone()).unwrap();
        assert_eq!(sel.design(&a), Some(&designs[0]));
        sel.set_design(&b, designs[1].clone()).unwrap();
        assert_eq!(sel.design(&a), Some(&designs[0]));
        assert_eq!(sel.design(&b), Some(&designs[1]));
    }

    #[test]
    fn total_price_reads_live_data() {
        let mut reg = registry();
        let mut sel = SelectionSet::new();
        sel.toggle(&reg, &id("32")).unwrap();
        sel.toggle(&reg, &id("33")).unwrap();
        sel.toggle(&reg, &id("06")).unwrap();
        // цен ещё нет
        assert_eq!(sel.total_price(&reg), 0.0);

        reg.enrich(&[ApiProduct { sizes: "3mx3m".into(), prices: "4000".into(), ..Default::default() }]);
        assert_eq!(sel.total_price(&reg), 8000.0);

        let design = BoothDesign {
            id: "custom".into(),
            name: "Custom".into(),
            size: "3mx3m".into(),
            image_path: String::new(),
            price: 5000.0,
            description: None,
        };
        sel.set_design(&id("33"), design).unwrap();
        assert_eq!(sel.total_price(&reg), 9000.0);

        sel.remove(&id("33"));
        assert_eq!(sel.total_price(&reg), 4000.0);
        assert!(sel.design(&id("33")).is_none());
    }

    #[test]
    fn clear_empties_both_maps() {
        let reg = registry();
        let mut sel = SelectionSet::new();
        sel.toggle(&reg, &id("06")).unwrap();
        sel.set_design(&id("06"), reg.designs_for(&id("06")).remove(0)).unwrap();
        sel.clear();
        assert!(sel.is_empty());
        assert!(sel.designs().is_empty());
        assert!(!sel.all_designs_selected());
    }

    #[test]
    fn unavailable_in_reports_booths_taken_after_selection() {
        let mut reg = registry();
        let mut sel = SelectionSet::new();
        sel.toggle(&reg, &id("20")).unwrap();
        sel.toggle(&reg, &id("21")).unwrap();
        reg.mark_booked(&["21"]);
        assert_eq!(sel.unavailable_in(&reg), vec![id("21")]);
    }
}
