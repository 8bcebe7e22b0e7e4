/*!
 * # Reference Data
 *
 * Immutable lookup tables of valid unit and tax-rate identifiers. Both lists
 * are loaded once at startup, either from JSON files named in the
 * configuration or from the datasets bundled with the binary, and are shared
 * read-only with the services that validate against them.
 */

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;
use tracing::info;
use utoipa::ToSchema;

use crate::config::AppConfig;

const BUNDLED_UNITS: &str = include_str!("../data/units.json");
const BUNDLED_TAX_RATES: &str = include_str!("../data/tax_rates.json");

/// A unit of measure a material can be tracked in
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Unit {
    pub id: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
}

/// A tax rate a material can be billed under
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TaxRate {
    pub id: i64,
    pub name: String,
    /// Rate as a decimal fraction (0.18 for 18%)
    pub rate: f64,
}

#[derive(Debug, Error)]
pub enum ReferenceDataError {
    #[error("Failed to read {kind} from {path}: {source}")]
    Io {
        kind: &'static str,
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse {kind}: {source}")]
    Parse {
        kind: &'static str,
        source: serde_json::Error,
    },

    #[error("Duplicate {kind} id {id}")]
    DuplicateId { kind: &'static str, id: i64 },
}

trait ReferenceEntry: DeserializeOwned {
    const KIND: &'static str;

    fn id(&self) -> i64;
}

impl ReferenceEntry for Unit {
    const KIND: &'static str = "units";

    fn id(&self) -> i64 {
        self.id
    }
}

impl ReferenceEntry for TaxRate {
    const KIND: &'static str = "tax rates";

    fn id(&self) -> i64 {
        self.id
    }
}

/// Valid units and tax rates, keyed by id
#[derive(Debug, Clone, Default)]
pub struct ReferenceData {
    units: BTreeMap<i64, Unit>,
    tax_rates: BTreeMap<i64, TaxRate>,
}

impl ReferenceData {
    /// Builds the lookup tables, rejecting duplicate ids.
    pub fn new(units: Vec<Unit>, tax_rates: Vec<TaxRate>) -> Result<Self, ReferenceDataError> {
        Ok(Self {
            units: index_by_id(units)?,
            tax_rates: index_by_id(tax_rates)?,
        })
    }

    /// The datasets compiled into the binary.
    pub fn bundled() -> Result<Self, ReferenceDataError> {
        Self::new(parse(BUNDLED_UNITS)?, parse(BUNDLED_TAX_RATES)?)
    }

    /// Loads each list from its file when a path is given, falling back to
    /// the bundled dataset otherwise.
    pub fn load(
        units_path: Option<&Path>,
        tax_rates_path: Option<&Path>,
    ) -> Result<Self, ReferenceDataError> {
        let units = match units_path {
            Some(path) => read_file(path)?,
            None => parse(BUNDLED_UNITS)?,
        };
        let tax_rates = match tax_rates_path {
            Some(path) => read_file(path)?,
            None => parse(BUNDLED_TAX_RATES)?,
        };

        let data = Self::new(units, tax_rates)?;
        info!(
            units = data.units.len(),
            tax_rates = data.tax_rates.len(),
            "Reference data loaded"
        );
        Ok(data)
    }

    pub fn from_config(cfg: &AppConfig) -> Result<Self, ReferenceDataError> {
        Self::load(
            cfg.units_path.as_deref().map(Path::new),
            cfg.tax_rates_path.as_deref().map(Path::new),
        )
    }

    pub fn is_valid_unit(&self, id: i64) -> bool {
        self.units.contains_key(&id)
    }

    pub fn is_valid_tax_rate(&self, id: i64) -> bool {
        self.tax_rates.contains_key(&id)
    }

    /// Units ordered by id
    pub fn units(&self) -> Vec<Unit> {
        self.units.values().cloned().collect()
    }

    /// Tax rates ordered by id
    pub fn tax_rates(&self) -> Vec<TaxRate> {
        self.tax_rates.values().cloned().collect()
    }
}

fn parse<T: ReferenceEntry>(raw: &str) -> Result<Vec<T>, ReferenceDataError> {
    serde_json::from_str(raw).map_err(|source| ReferenceDataError::Parse {
        kind: T::KIND,
        source,
    })
}

fn read_file<T: ReferenceEntry>(path: &Path) -> Result<Vec<T>, ReferenceDataError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ReferenceDataError::Io {
        kind: T::KIND,
        path: path.display().to_string(),
        source,
    })?;
    parse(&raw)
}

fn index_by_id<T: ReferenceEntry>(entries: Vec<T>) -> Result<BTreeMap<i64, T>, ReferenceDataError> {
    let mut indexed = BTreeMap::new();
    for entry in entries {
        let id = entry.id();
        if indexed.insert(id, entry).is_some() {
            return Err(ReferenceDataError::DuplicateId { kind: T::KIND, id });
        }
    }
    Ok(indexed)
}
