use catalog_schema_engine::{ColumnKind, Formula, HeaderId, Operand, OperandGroup, Operator};

use crate::error::{Result, SchemaError};
use crate::header::{BaseColumn, Header, TOTAL_ORDER};
use crate::settings::Settings;

/// The ordered collection of column headers being edited.
///
/// Headers are owned values: a snapshot taken with `clone()` never shares
/// operand storage with the live registry.
#[derive(Clone, Debug, PartialEq)]
pub struct Registry {
    /// Headers sorted by `order`
    pub(crate) headers: Vec<Header>,
    /// Custom headers parked by `remove` so they can be restored
    pub(crate) removed: Vec<Header>,
    /// Title used for blank custom headers
    pub(crate) fallback_title: String,
}

impl Registry {
    /// Create the default registry: every built-in column, with Total
    /// computed as Quantity × Unit Cost.
    pub fn new() -> Self {
        Self::with_settings(&Settings::default())
    }

    pub fn with_settings(settings: &Settings) -> Self {
        let mut unit = Header::built_in(BaseColumn::Unit);
        unit.order = 2;
        let mut quantity = Header::built_in(BaseColumn::Quantity);
        quantity.order = 3;

        let mut total = Header::built_in(BaseColumn::Total);
        total.formula = Formula::new(vec![OperandGroup::new(
            Operator::Multiply,
            vec![
                Operand::filled(
                    BaseColumn::Quantity.header_id(),
                    BaseColumn::Quantity.label(),
                    ColumnKind::Base,
                ),
                Operand::filled(
                    BaseColumn::UnitCost.header_id(),
                    BaseColumn::UnitCost.label(),
                    ColumnKind::Base,
                ),
            ],
        )]);

        Self::from_headers(
            vec![
                Header::built_in(BaseColumn::Detail),
                unit,
                quantity,
                Header::built_in(BaseColumn::UnitCost),
                total,
            ],
            &settings.fallback_title,
        )
    }

    pub(crate) fn from_headers(headers: Vec<Header>, fallback_title: &str) -> Self {
        let mut registry = Registry {
            headers,
            removed: Vec::new(),
            fallback_title: fallback_title.to_string(),
        };
        registry.normalize();
        registry
    }

    /// Re-establish ordering invariants after a mutation.
    pub(crate) fn normalize(&mut self) {
        for header in &mut self.headers {
            if header.is_base(BaseColumn::Total) {
                header.order = TOTAL_ORDER;
            }
        }
        self.headers.sort_by_key(|header| header.order);
    }

    pub fn headers(&self) -> &[Header] {
        &self.headers
    }

    pub fn get(&self, id: &HeaderId) -> Option<&Header> {
        self.headers.iter().find(|header| &header.id == id)
    }

    pub fn contains(&self, id: &HeaderId) -> bool {
        self.get(id).is_some()
    }

    pub fn base_header(&self, base: BaseColumn) -> Option<&Header> {
        self.headers.iter().find(|header| header.is_base(base))
    }

    pub(crate) fn require(&self, id: &HeaderId) -> Result<&Header> {
        self.get(id)
            .ok_or_else(|| SchemaError::UnknownHeader(id.clone()))
    }

    /// Apply `f` to one header, then normalize.
    pub(crate) fn update<F, R>(&mut self, id: &HeaderId, f: F) -> Result<R>
    where
        F: FnOnce(&mut Header) -> Result<R>,
    {
        let header = self
            .headers
            .iter_mut()
            .find(|header| &header.id == id)
            .ok_or_else(|| SchemaError::UnknownHeader(id.clone()))?;
        let result = f(header)?;
        self.normalize();
        Ok(result)
    }

    pub fn title_of(&self, id: &HeaderId) -> String {
        self.get(id)
            .map(|header| header.display_title(&self.fallback_title))
            .unwrap_or_else(|| id.to_string())
    }

    pub fn fallback_title(&self) -> &str {
        &self.fallback_title
    }

    /// Non-base headers in order; their 1-based positions are the attribute
    /// indices used by the submission payload.
    pub fn attribute_headers(&self) -> impl Iterator<Item = &Header> + '_ {
        self.headers.iter().filter(|header| !header.is_base_header)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
