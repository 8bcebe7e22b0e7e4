use std::sync::Arc;

use crate::{
    db::{DatabaseAccess, DbPool},
    entities::material::{self, Column as MaterialColumn, Entity as Material},
    errors::ServiceError,
    metrics::METRICS,
    reference::ReferenceData,
};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, EntityTrait, NotSet, QueryFilter, QueryOrder,
    Set,
};
use serde::{de::Error as _, Deserialize, Deserializer, Serialize};
use tracing::{info, instrument, warn};
use utoipa::ToSchema;

pub const MISSING_FIELDS: &str = "Missing required fields";
pub const INVALID_UNIT_ID: &str = "Invalid unitId";
pub const INVALID_TAX_RATE_ID: &str = "Invalid taxRateId";
pub const DUPLICATE_MATERIAL: &str = "Duplicate batchNumber + materialName";
pub const MATERIAL_ADDED: &str = "Material added";
pub const MATERIAL_UPDATED: &str = "Material updated";
pub const MATERIAL_DELETED: &str = "Material deleted";

/// Payload accepted by create and update. Every field may be absent on the
/// wire; create insists on all of them, update writes whatever it is given.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "batchNumber": "B1",
    "materialName": "Steel",
    "alertQuantity": 10,
    "unitId": 1,
    "taxRateId": 1
}))]
pub struct MaterialInput {
    #[schema(example = "B1")]
    pub batch_number: Option<String>,
    #[schema(example = "Steel")]
    pub material_name: Option<String>,
    /// Low-stock threshold
    #[schema(example = 10.0)]
    pub alert_quantity: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_id")]
    #[schema(example = 1)]
    pub unit_id: Option<i64>,
    #[serde(default, deserialize_with = "deserialize_id")]
    #[schema(example = 1)]
    pub tax_rate_id: Option<i64>,
}

/// Reference ids arrive as JSON numbers; `1.0` names the same id as `1`
fn deserialize_id<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Integer(i64),
        Float(f64),
    }

    match Option::<RawId>::deserialize(deserializer)? {
        None => Ok(None),
        Some(RawId::Integer(id)) => Ok(Some(id)),
        Some(RawId::Float(value))
            if value.fract() == 0.0 && value >= i64::MIN as f64 && value < i64::MAX as f64 =>
        {
            Ok(Some(value as i64))
        }
        Some(RawId::Float(value)) => Err(D::Error::custom(format!(
            "invalid id {value}, expected an integer"
        ))),
    }
}

/// A fully populated material ready to be inserted
#[derive(Debug, Clone, PartialEq)]
pub struct NewMaterial {
    pub batch_number: String,
    pub material_name: String,
    pub alert_quantity: f64,
    pub unit_id: i64,
    pub tax_rate_id: i64,
}

impl MaterialInput {
    /// Demands every field be present and truthy. Empty strings, zero and NaN
    /// count as missing.
    pub fn require_all(&self) -> Result<NewMaterial, ServiceError> {
        let missing = || ServiceError::ValidationError(MISSING_FIELDS.to_string());

        let batch_number = self.batch_number.clone().filter(|s| !s.is_empty());
        let material_name = self.material_name.clone().filter(|s| !s.is_empty());
        let alert_quantity = self.alert_quantity.filter(|q| !is_falsy_number(*q));
        let unit_id = self.unit_id.filter(|id| *id != 0);
        let tax_rate_id = self.tax_rate_id.filter(|id| *id != 0);

        Ok(NewMaterial {
            batch_number: batch_number.ok_or_else(missing)?,
            material_name: material_name.ok_or_else(missing)?,
            alert_quantity: alert_quantity.ok_or_else(missing)?,
            unit_id: unit_id.ok_or_else(missing)?,
            tax_rate_id: tax_rate_id.ok_or_else(missing)?,
        })
    }
}

/// Zero and NaN are treated as "not provided"
pub fn is_falsy_number(value: f64) -> bool {
    value == 0.0 || value.is_nan()
}

/// Service for managing material records
#[derive(Debug, Clone)]
pub struct MaterialService {
    db: DatabaseAccess,
    reference: Arc<ReferenceData>,
}

impl MaterialService {
    pub fn new(db_pool: Arc<DbPool>, reference: Arc<ReferenceData>) -> Self {
        Self {
            db: DatabaseAccess::new(db_pool),
            reference,
        }
    }

    fn check_references(
        &self,
        unit_id: Option<i64>,
        tax_rate_id: Option<i64>,
    ) -> Result<(), ServiceError> {
        if !unit_id.is_some_and(|id| self.reference.is_valid_unit(id)) {
            return Err(validation_failure(INVALID_UNIT_ID));
        }
        if !tax_rate_id.is_some_and(|id| self.reference.is_valid_tax_rate(id)) {
            return Err(validation_failure(INVALID_TAX_RATE_ID));
        }
        Ok(())
    }

    /// Looks for a record holding the pair, ignoring `exclude_id`
    async fn find_duplicate(
        &self,
        batch_number: &str,
        material_name: &str,
        exclude_id: Option<i32>,
    ) -> Result<Option<material::Model>, ServiceError> {
        let batch_number = batch_number.to_string();
        let material_name = material_name.to_string();

        self.db
            .execute("find_duplicate_material", move |db| {
                Box::pin(async move {
                    let mut query = Material::find()
                        .filter(MaterialColumn::BatchNumber.eq(batch_number))
                        .filter(MaterialColumn::MaterialName.eq(material_name));
                    if let Some(id) = exclude_id {
                        query = query.filter(MaterialColumn::Id.ne(id));
                    }
                    query.one(db).await
                })
            })
            .await
    }

    /// Validates and stores a new material
    #[instrument(skip(self))]
    pub async fn create_material(&self, input: MaterialInput) -> Result<&'static str, ServiceError> {
        let new = input.require_all().map_err(|e| {
            METRICS.counter("materials_validation_failures_total").inc();
            e
        })?;
        self.check_references(Some(new.unit_id), Some(new.tax_rate_id))?;

        if self
            .find_duplicate(&new.batch_number, &new.material_name, None)
            .await?
            .is_some()
        {
            return Err(duplicate());
        }

        let active = material::ActiveModel {
            id: NotSet,
            batch_number: Set(new.batch_number.clone()),
            material_name: Set(new.material_name.clone()),
            alert_quantity: Set(new.alert_quantity),
            unit_id: Set(new.unit_id),
            tax_rate_id: Set(new.tax_rate_id),
        };

        let created = self
            .db
            .execute("insert_material", move |db| {
                Box::pin(async move { active.insert(db).await })
            })
            .await
            .map_err(remap_conflict)?;

        METRICS.counter("materials_created_total").inc();
        info!(
            material_id = created.id,
            batch_number = %created.batch_number,
            material_name = %created.material_name,
            "Material created"
        );
        Ok(MATERIAL_ADDED)
    }

    /// Every stored material in ascending id order
    #[instrument(skip(self))]
    pub async fn list_materials(&self) -> Result<Vec<material::Model>, ServiceError> {
        self.db
            .execute("list_materials", |db| {
                Box::pin(async move {
                    Material::find()
                        .order_by_asc(MaterialColumn::Id)
                        .all(db)
                        .await
                })
            })
            .await
    }

    /// Overwrites all five mutable fields of record `id`.
    ///
    /// Presence is not re-checked: an absent field is written as NULL and the
    /// store's NOT NULL constraint rejects it. An unknown id matches no row and
    /// still counts as success.
    #[instrument(skip(self))]
    pub async fn update_material(
        &self,
        id: i32,
        input: MaterialInput,
    ) -> Result<&'static str, ServiceError> {
        self.check_references(input.unit_id, input.tax_rate_id)?;

        if let (Some(batch_number), Some(material_name)) =
            (input.batch_number.as_deref(), input.material_name.as_deref())
        {
            if self
                .find_duplicate(batch_number, material_name, Some(id))
                .await?
                .is_some()
            {
                return Err(duplicate());
            }
        }

        let rows = self
            .db
            .execute("update_material", move |db| {
                Box::pin(async move {
                    Material::update_many()
                        .col_expr(MaterialColumn::BatchNumber, Expr::value(input.batch_number))
                        .col_expr(MaterialColumn::MaterialName, Expr::value(input.material_name))
                        .col_expr(MaterialColumn::AlertQuantity, Expr::value(input.alert_quantity))
                        .col_expr(MaterialColumn::UnitId, Expr::value(input.unit_id))
                        .col_expr(MaterialColumn::TaxRateId, Expr::value(input.tax_rate_id))
                        .filter(MaterialColumn::Id.eq(id))
                        .exec(db)
                        .await
                        .map(|res| res.rows_affected)
                })
            })
            .await
            .map_err(remap_conflict)?;

        if rows == 0 {
            warn!(material_id = id, "Update matched no material");
        } else {
            METRICS.counter("materials_updated_total").inc();
            info!(material_id = id, "Material updated");
        }
        Ok(MATERIAL_UPDATED)
    }

    /// Removes record `id`; deleting an unknown id succeeds
    #[instrument(skip(self))]
    pub async fn delete_material(&self, id: i32) -> Result<&'static str, ServiceError> {
        let rows = self
            .db
            .execute("delete_material", move |db| {
                Box::pin(async move {
                    Material::delete_by_id(id)
                        .exec(db)
                        .await
                        .map(|res| res.rows_affected)
                })
            })
            .await?;

        if rows == 0 {
            warn!(material_id = id, "Delete matched no material");
        } else {
            METRICS.counter("materials_deleted_total").inc();
            info!(material_id = id, "Material deleted");
        }
        Ok(MATERIAL_DELETED)
    }
}

fn validation_failure(message: &str) -> ServiceError {
    METRICS.counter("materials_validation_failures_total").inc();
    ServiceError::ValidationError(message.to_string())
}

fn duplicate() -> ServiceError {
    METRICS.counter("materials_conflicts_total").inc();
    ServiceError::Conflict(DUPLICATE_MATERIAL.to_string())
}

/// A unique-index violation lost the race with the pre-check
fn remap_conflict(err: ServiceError) -> ServiceError {
    match err {
        ServiceError::Conflict(_) => duplicate(),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{establish_connection, run_migrations};
    use tempfile::TempDir;

    fn steel() -> MaterialInput {
        MaterialInput {
            batch_number: Some("B1".into()),
            material_name: Some("Steel".into()),
            alert_quantity: Some(10.0),
            unit_id: Some(1),
            tax_rate_id: Some(1),
        }
    }

    async fn setup_service(dir: &TempDir) -> MaterialService {
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("db.sqlite").display());
        let pool = establish_connection(&url).await.unwrap();
        run_migrations(&pool).await.unwrap();
        MaterialService::new(
            Arc::new(pool),
            Arc::new(ReferenceData::bundled().unwrap()),
        )
    }

    #[test]
    fn require_all_accepts_complete_input() {
        let new = steel().require_all().unwrap();
        assert_eq!(new.batch_number, "B1");
        assert_eq!(new.alert_quantity, 10.0);
    }

    #[test]
    fn require_all_treats_falsy_values_as_missing() {
        let cases = [
            MaterialInput { batch_number: Some(String::new()), ..steel() },
            MaterialInput { material_name: None, ..steel() },
            MaterialInput { alert_quantity: Some(0.0), ..steel() },
            MaterialInput { alert_quantity: Some(f64::NAN), ..steel() },
            MaterialInput { unit_id: Some(0), ..steel() },
            MaterialInput { tax_rate_id: None, ..steel() },
        ];
        for input in cases {
            let err = input.require_all().unwrap_err();
            assert_eq!(err.response_message(), MISSING_FIELDS);
        }
    }

    #[test]
    fn negative_quantity_is_not_falsy() {
        assert!(!is_falsy_number(-1.0));
        assert!(is_falsy_number(-0.0));
    }

    #[tokio::test]
    async fn create_then_list_round_trips() {
        let dir = TempDir::new().unwrap();
        let service = setup_service(&dir).await;

        assert_eq!(service.create_material(steel()).await.unwrap(), MATERIAL_ADDED);

        let rows = service.list_materials().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].batch_number, "B1");
        assert_eq!(rows[0].material_name, "Steel");
        assert_eq!(rows[0].alert_quantity, 10.0);
        assert_eq!(rows[0].unit_id, 1);
        assert_eq!(rows[0].tax_rate_id, 1);
    }

    #[tokio::test]
    async fn create_rejects_duplicate_pair() {
        let dir = TempDir::new().unwrap();
        let service = setup_service(&dir).await;

        service.create_material(steel()).await.unwrap();
        let err = service.create_material(steel()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(ref m) if m == DUPLICATE_MATERIAL));
    }

    #[tokio::test]
    async fn create_checks_unit_before_tax_rate() {
        let dir = TempDir::new().unwrap();
        let service = setup_service(&dir).await;

        let input = MaterialInput {
            unit_id: Some(9999),
            tax_rate_id: Some(9999),
            ..steel()
        };
        let err = service.create_material(input).await.unwrap_err();
        assert_eq!(err.response_message(), INVALID_UNIT_ID);

        let input = MaterialInput {
            tax_rate_id: Some(9999),
            ..steel()
        };
        let err = service.create_material(input).await.unwrap_err();
        assert_eq!(err.response_message(), INVALID_TAX_RATE_ID);
    }

    #[tokio::test]
    async fn update_ignores_its_own_record_when_checking_duplicates() {
        let dir = TempDir::new().unwrap();
        let service = setup_service(&dir).await;

        service.create_material(steel()).await.unwrap();
        let id = service.list_materials().await.unwrap()[0].id;

        let input = MaterialInput {
            alert_quantity: Some(25.5),
            ..steel()
        };
        assert_eq!(
            service.update_material(id, input).await.unwrap(),
            MATERIAL_UPDATED
        );
        assert_eq!(service.list_materials().await.unwrap()[0].alert_quantity, 25.5);
    }

    #[tokio::test]
    async fn update_rejects_pair_owned_by_another_record() {
        let dir = TempDir::new().unwrap();
        let service = setup_service(&dir).await;

        service.create_material(steel()).await.unwrap();
        let copper = MaterialInput {
            batch_number: Some("B2".into()),
            material_name: Some("Copper".into()),
            ..steel()
        };
        service.create_material(copper).await.unwrap();
        let copper_id = service.list_materials().await.unwrap()[1].id;

        let err = service.update_material(copper_id, steel()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn update_does_not_recheck_presence() {
        let dir = TempDir::new().unwrap();
        let service = setup_service(&dir).await;

        service.create_material(steel()).await.unwrap();
        let id = service.list_materials().await.unwrap()[0].id;

        let zero = MaterialInput {
            alert_quantity: Some(0.0),
            ..steel()
        };
        service.update_material(id, zero).await.unwrap();
        assert_eq!(service.list_materials().await.unwrap()[0].alert_quantity, 0.0);

        let absent = MaterialInput {
            material_name: None,
            ..steel()
        };
        let err = service.update_material(id, absent).await.unwrap_err();
        assert!(matches!(err, ServiceError::DatabaseError(_)));
    }

    #[tokio::test]
    async fn update_requires_known_references() {
        let dir = TempDir::new().unwrap();
        let service = setup_service(&dir).await;

        let input = MaterialInput {
            unit_id: None,
            ..steel()
        };
        let err = service.update_material(1, input).await.unwrap_err();
        assert_eq!(err.response_message(), INVALID_UNIT_ID);
    }

    #[tokio::test]
    async fn update_and_delete_of_unknown_id_succeed() {
        let dir = TempDir::new().unwrap();
        let service = setup_service(&dir).await;

        assert_eq!(
            service.update_material(42, steel()).await.unwrap(),
            MATERIAL_UPDATED
        );
        assert_eq!(service.delete_material(42).await.unwrap(), MATERIAL_DELETED);
        assert!(service.list_materials().await.unwrap().is_empty());
    }

    #[test]
    fn integral_float_ids_name_the_same_reference() {
        let input: MaterialInput =
            serde_json::from_str(r#"{ "unitId": 1.0, "taxRateId": 2 }"#).unwrap();
        assert_eq!(input.unit_id, Some(1));
        assert_eq!(input.tax_rate_id, Some(2));

        let input: MaterialInput = serde_json::from_str(r#"{ "unitId": null }"#).unwrap();
        assert_eq!(input.unit_id, None);
        assert_eq!(input.tax_rate_id, None);

        assert!(serde_json::from_str::<MaterialInput>(r#"{ "unitId": 1.5 }"#).is_err());
        assert!(serde_json::from_str::<MaterialInput>(r#"{ "unitId": "1" }"#).is_err());
    }

    #[tokio::test]
    async fn unique_index_violation_reports_the_duplicate_message() {
        let dir = TempDir::new().unwrap();
        let service = setup_service(&dir).await;

        let row = || material::ActiveModel {
            id: NotSet,
            batch_number: Set("B1".into()),
            material_name: Set("Steel".into()),
            alert_quantity: Set(10.0),
            unit_id: Set(1),
            tax_rate_id: Set(1),
        };

        // bypass the pre-check and write the same pair twice
        let first = row();
        service
            .db
            .execute("insert_material", move |db| {
                Box::pin(async move { first.insert(db).await })
            })
            .await
            .unwrap();

        let second = row();
        let err = service
            .db
            .execute("insert_material", move |db| {
                Box::pin(async move { second.insert(db).await })
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));

        let remapped = remap_conflict(err);
        assert_eq!(remapped.status_code(), axum::http::StatusCode::CONFLICT);
        assert_eq!(remapped.response_message(), DUPLICATE_MATERIAL);

        assert_eq!(service.list_materials().await.unwrap().len(), 1);
    }

    #[test]
    fn remap_conflict_leaves_other_errors_alone() {
        let err = remap_conflict(ServiceError::InternalError("boom".into()));
        assert!(matches!(err, ServiceError::InternalError(ref m) if m == "boom"));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let service = setup_service(&dir).await;

        service.create_material(steel()).await.unwrap();
        let id = service.list_materials().await.unwrap()[0].id;

        service.delete_material(id).await.unwrap();
        service.delete_material(id).await.unwrap();
        assert!(service.list_materials().await.unwrap().is_empty());
    }
}
