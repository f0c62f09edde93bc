use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query,
    },
    http::StatusCode,
    response::Json,
    Extension,
};
use modkit::ProblemResponse;
use tracing::{error, info};
use uuid::Uuid;

use crate::api::rest::dto::{
    BulkDeleteReportDto, BulkDeleteReq, CreateVoucherReq, ListVouchersQuery, UpdateVoucherReq,
    VoucherDto,
};
use crate::api::rest::error::RequestMeta;
use crate::contract::model::NewVoucher;
use crate::domain::listing::ListQuery;
use crate::domain::service::Service;
use crate::domain::status;

type ApiResult<T> = Result<T, ProblemResponse>;

/// List vouchers, newest first, with optional search, filters and sort
pub async fn list_vouchers(
    Extension(svc): Extension<Arc<Service>>,
    meta: RequestMeta,
    query: Result<Query<ListVouchersQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<VoucherDto>>> {
    let Query(query) = query.map_err(|r| meta.query_rejection(r))?;
    info!("Listing vouchers with query: {:?}", query);

    let list_query = ListQuery::try_from(query).map_err(|e| meta.domain(&e))?;
    match svc.list_vouchers(&list_query).await {
        Ok(vouchers) => {
            let today = status::today();
            Ok(Json(
                vouchers
                    .into_iter()
                    .map(|v| VoucherDto::from_voucher(v, today))
                    .collect(),
            ))
        }
        Err(e) => {
            error!("Failed to list vouchers: {}", e);
            Err(meta.domain(&e))
        }
    }
}

/// Get a voucher by id
pub async fn get_voucher(
    Extension(svc): Extension<Arc<Service>>,
    meta: RequestMeta,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<VoucherDto>> {
    let Path(id) = id.map_err(|r| meta.path_rejection(r))?;
    info!("Getting voucher with id: {}", id);

    match svc.get_voucher(id).await {
        Ok(voucher) => Ok(Json(VoucherDto::from(voucher))),
        Err(e) => {
            error!("Failed to get voucher {}: {}", id, e);
            Err(meta.domain(&e))
        }
    }
}

/// Create a voucher
pub async fn create_voucher(
    Extension(svc): Extension<Arc<Service>>,
    meta: RequestMeta,
    req: Result<Json<CreateVoucherReq>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<VoucherDto>)> {
    let Json(req) = req.map_err(|r| meta.json_rejection(r))?;
    info!("Creating voucher: {:?}", req);

    let new_voucher = NewVoucher::try_from(req).map_err(|e| meta.domain(&e))?;
    match svc.create_voucher(new_voucher).await {
        Ok(voucher) => Ok((StatusCode::CREATED, Json(VoucherDto::from(voucher)))),
        Err(e) => {
            error!("Failed to create voucher: {}", e);
            Err(meta.domain(&e))
        }
    }
}

/// Partially update a voucher
pub async fn update_voucher(
    Extension(svc): Extension<Arc<Service>>,
    meta: RequestMeta,
    id: Result<Path<Uuid>, PathRejection>,
    req: Result<Json<UpdateVoucherReq>, JsonRejection>,
) -> ApiResult<Json<VoucherDto>> {
    let Path(id) = id.map_err(|r| meta.path_rejection(r))?;
    let Json(req) = req.map_err(|r| meta.json_rejection(r))?;
    info!("Updating voucher {} with: {:?}", id, req);

    match svc.update_voucher(id, req.into()).await {
        Ok(voucher) => Ok(Json(VoucherDto::from(voucher))),
        Err(e) => {
            error!("Failed to update voucher {}: {}", id, e);
            Err(meta.domain(&e))
        }
    }
}

/// Delete a voucher
pub async fn delete_voucher(
    Extension(svc): Extension<Arc<Service>>,
    meta: RequestMeta,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<StatusCode> {
    let Path(id) = id.map_err(|r| meta.path_rejection(r))?;
    info!("Deleting voucher: {}", id);

    match svc.delete_voucher(id).await {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(e) => {
            error!("Failed to delete voucher {}: {}", id, e);
            Err(meta.domain(&e))
        }
    }
}

/// Delete several vouchers; per-id outcome in the report
pub async fn bulk_delete_vouchers(
    Extension(svc): Extension<Arc<Service>>,
    meta: RequestMeta,
    req: Result<Json<BulkDeleteReq>, JsonRejection>,
) -> ApiResult<Json<BulkDeleteReportDto>> {
    let Json(req) = req.map_err(|r| meta.json_rejection(r))?;
    info!("Bulk deleting {} vouchers", req.ids.len());

    match svc.bulk_delete(req.ids).await {
        Ok(report) => {
            if !report.is_complete_success() {
                error!(
                    failed = report.failed.len(),
                    succeeded = report.succeeded.len(),
                    "Bulk delete partially failed"
                );
            }
            Ok(Json(report.into()))
        }
        Err(e) => {
            error!("Failed to bulk delete vouchers: {}", e);
            Err(meta.domain(&e))
        }
    }
}
