use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Materials API",
        version = "0.1.0",
        description = r#"
# Materials Inventory API

Create, list, update and delete material records. Each material names a unit
and a tax rate drawn from the reference lists served at `/units` and
`/tax-rates`; the pair (`batchNumber`, `materialName`) is unique.

## Error Handling

Every failure carries a single field:

```json
{ "error": "Duplicate batchNumber + materialName" }
```
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:3000", description = "Local development")
    ),
    tags(
        (name = "materials", description = "Material record endpoints"),
        (name = "reference", description = "Unit and tax-rate lookup lists")
    ),
    paths(
        crate::handlers::materials::create_material,
        crate::handlers::materials::list_materials,
        crate::handlers::materials::update_material,
        crate::handlers::materials::delete_material,
        crate::handlers::reference::list_units,
        crate::handlers::reference::list_tax_rates,
    ),
    components(
        schemas(
            crate::entities::material::Model,
            crate::services::materials::MaterialInput,
            crate::handlers::common::MessageResponse,
            crate::reference::Unit,
            crate::reference::TaxRate,
            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDoc;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}
