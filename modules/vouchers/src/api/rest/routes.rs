use axum::{Extension, Router};
use modkit::api::{Missing, OpenApiRegistry, OperationBuilder};
use std::sync::Arc;

use crate::api::rest::{dto, handlers};
use crate::domain::service::Service;

pub fn register_routes(
    mut router: Router,
    openapi: &dyn OpenApiRegistry,
    service: Arc<Service>,
) -> anyhow::Result<Router> {
    // GET /vouchers - List vouchers
    router = OperationBuilder::<Missing, Missing, ()>::get("/vouchers")
        .operation_id("vouchers.list_vouchers")
        .summary("List vouchers")
        .description("All vouchers, newest first, optionally searched, filtered and sorted")
        .tag("vouchers")
        .query_param("search", false, "Case-insensitive match on code, amount or type")
        .query_param("status", false, "active | expired | inactive | all")
        .query_param("type", false, "percentage | fixed | all")
        .query_param(
            "sort",
            false,
            "code | discountAmount | discountType | expiryDate | status",
        )
        .query_param("order", false, "asc | desc")
        .handler(handlers::list_vouchers)
        .json_array_response_with_schema::<dto::VoucherDto>(openapi, 200, "List of vouchers")
        .problem_response(openapi, 400, "Bad Request")
        .problem_response(openapi, 500, "Internal Server Error")
        .register(router, openapi);

    // POST /vouchers - Create a voucher
    router = OperationBuilder::<Missing, Missing, ()>::post("/vouchers")
        .operation_id("vouchers.create_voucher")
        .summary("Create a voucher")
        .tag("vouchers")
        .json_request::<dto::CreateVoucherReq>(openapi, "Voucher creation data")
        .handler(handlers::create_voucher)
        .json_response_with_schema::<dto::VoucherDto>(openapi, 201, "Created voucher")
        .problem_response(openapi, 400, "Bad Request")
        .problem_response(openapi, 409, "Voucher code already in use")
        .problem_response(openapi, 500, "Internal Server Error")
        .register(router, openapi);

    // POST /vouchers/bulk-delete - Delete several vouchers
    router = OperationBuilder::<Missing, Missing, ()>::post("/vouchers/bulk-delete")
        .operation_id("vouchers.bulk_delete_vouchers")
        .summary("Delete several vouchers")
        .description("Deletes each id independently and reports per-id outcome")
        .tag("vouchers")
        .json_request::<dto::BulkDeleteReq>(openapi, "Ids to delete")
        .handler(handlers::bulk_delete_vouchers)
        .json_response_with_schema::<dto::BulkDeleteReportDto>(openapi, 200, "Per-id report")
        .problem_response(openapi, 400, "Bad Request")
        .problem_response(openapi, 500, "Internal Server Error")
        .register(router, openapi);

    // GET /vouchers/{id} - Get a voucher
    router = OperationBuilder::<Missing, Missing, ()>::get("/vouchers/{id}")
        .operation_id("vouchers.get_voucher")
        .summary("Get voucher by ID")
        .tag("vouchers")
        .path_param("id", "Voucher UUID")
        .handler(handlers::get_voucher)
        .json_response_with_schema::<dto::VoucherDto>(openapi, 200, "Voucher found")
        .problem_response(openapi, 400, "Bad Request")
        .problem_response(openapi, 404, "Not Found")
        .problem_response(openapi, 500, "Internal Server Error")
        .register(router, openapi);

    // PATCH /vouchers/{id} - Partial update
    router = OperationBuilder::<Missing, Missing, ()>::patch("/vouchers/{id}")
        .operation_id("vouchers.update_voucher")
        .summary("Update voucher")
        .description("Partial update; `expiryDate: null` clears the expiry")
        .tag("vouchers")
        .path_param("id", "Voucher UUID")
        .json_request::<dto::UpdateVoucherReq>(openapi, "Fields to change")
        .handler(handlers::update_voucher)
        .json_response_with_schema::<dto::VoucherDto>(openapi, 200, "Updated voucher")
        .problem_response(openapi, 400, "Bad Request")
        .problem_response(openapi, 404, "Not Found")
        .problem_response(openapi, 409, "Voucher code already in use")
        .problem_response(openapi, 500, "Internal Server Error")
        .register(router, openapi);

    // DELETE /vouchers/{id} - Delete a voucher
    router = OperationBuilder::<Missing, Missing, ()>::delete("/vouchers/{id}")
        .operation_id("vouchers.delete_voucher")
        .summary("Delete voucher")
        .tag("vouchers")
        .path_param("id", "Voucher UUID")
        .handler(handlers::delete_voucher)
        .json_response(204, "Voucher deleted")
        .problem_response(openapi, 404, "Not Found")
        .problem_response(openapi, 500, "Internal Server Error")
        .register(router, openapi);

    router = router.layer(Extension(service));

    Ok(router)
}
