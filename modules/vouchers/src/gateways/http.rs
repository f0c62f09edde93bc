//! Remote `VouchersApi` over the REST API.

use async_trait::async_trait;
use modkit::{Problem, TracedClient};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;
use uuid::Uuid;

use crate::api::rest::dto::{
    BulkDeleteReportDto, BulkDeleteReq, CreateVoucherReq, UpdateVoucherReq, VoucherDto,
};
use crate::contract::{
    client::VouchersApi,
    error::VouchersError,
    model::{BulkDeleteReport, NewVoucher, Voucher, VoucherPatch},
};
use crate::domain::service::normalize_code;

pub struct VouchersHttpClient {
    base: Url,
    client: TracedClient,
}

impl VouchersHttpClient {
    /// `base` is the server root, e.g. `http://127.0.0.1:8087`.
    pub fn new(base: &str, client: TracedClient) -> Result<Self, url::ParseError> {
        Ok(Self {
            base: Url::parse(base)?,
            client,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base.as_str().trim_end_matches('/'), path)
    }

    async fn call(
        &self,
        builder: reqwest::RequestBuilder,
        ctx: ErrorCtx<'_>,
    ) -> Result<reqwest::Response, VouchersError> {
        let resp = self
            .client
            .send(builder)
            .await
            .map_err(|e| VouchersError::transport(e.to_string()))?;
        if resp.status().is_success() {
            Ok(resp)
        } else {
            Err(error_from_response(resp, ctx).await)
        }
    }
}

/// What the caller knows about the request, used to fill error variants.
#[derive(Default, Clone, Copy)]
struct ErrorCtx<'a> {
    id: Option<Uuid>,
    code: Option<&'a str>,
}

async fn read_json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, VouchersError> {
    resp.json::<T>()
        .await
        .map_err(|e| VouchersError::transport(format!("invalid response body: {e}")))
}

async fn error_from_response(resp: reqwest::Response, ctx: ErrorCtx<'_>) -> VouchersError {
    let status = resp.status();
    let problem = resp.json::<Problem>().await.ok();
    debug!(status = status.as_u16(), problem = ?problem, "Voucher API returned an error");
    let detail = problem
        .map(|p| p.detail)
        .unwrap_or_else(|| status.to_string());

    match status {
        StatusCode::NOT_FOUND => VouchersError::not_found(ctx.id.unwrap_or_default()),
        StatusCode::CONFLICT => VouchersError::code_conflict(ctx.code.unwrap_or_default()),
        StatusCode::BAD_REQUEST => VouchersError::validation(detail),
        _ => VouchersError::transport(format!("{status}: {detail}")),
    }
}

#[async_trait]
impl VouchersApi for VouchersHttpClient {
    async fn list_vouchers(&self) -> Result<Vec<Voucher>, VouchersError> {
        let req = self.client.request(Method::GET, &self.url("/vouchers"));
        let resp = self.call(req, ErrorCtx::default()).await?;
        let dtos: Vec<VoucherDto> = read_json(resp).await?;
        Ok(dtos.into_iter().map(Voucher::from).collect())
    }

    async fn get_voucher(&self, id: Uuid) -> Result<Voucher, VouchersError> {
        let req = self
            .client
            .request(Method::GET, &self.url(&format!("/vouchers/{id}")));
        let resp = self
            .call(req, ErrorCtx { id: Some(id), code: None })
            .await?;
        Ok(read_json::<VoucherDto>(resp).await?.into())
    }

    async fn create_voucher(&self, new_voucher: NewVoucher) -> Result<Voucher, VouchersError> {
        let code = normalize_code(&new_voucher.code);
        let body = CreateVoucherReq::from(new_voucher);
        let req = self
            .client
            .request(Method::POST, &self.url("/vouchers"))
            .json(&body);
        let resp = self
            .call(req, ErrorCtx { id: None, code: Some(&code) })
            .await?;
        Ok(read_json::<VoucherDto>(resp).await?.into())
    }

    async fn update_voucher(
        &self,
        id: Uuid,
        patch: VoucherPatch,
    ) -> Result<Voucher, VouchersError> {
        let code = patch.code.as_deref().map(normalize_code);
        let body = UpdateVoucherReq::from(patch);
        let req = self
            .client
            .request(Method::PATCH, &self.url(&format!("/vouchers/{id}")))
            .json(&body);
        let ctx = ErrorCtx {
            id: Some(id),
            code: code.as_deref(),
        };
        let resp = self.call(req, ctx).await?;
        Ok(read_json::<VoucherDto>(resp).await?.into())
    }

    async fn delete_voucher(&self, id: Uuid) -> Result<(), VouchersError> {
        let req = self
            .client
            .request(Method::DELETE, &self.url(&format!("/vouchers/{id}")));
        self.call(req, ErrorCtx { id: Some(id), code: None })
            .await?;
        Ok(())
    }

    async fn bulk_delete_vouchers(
        &self,
        ids: Vec<Uuid>,
    ) -> Result<BulkDeleteReport, VouchersError> {
        let req = self
            .client
            .request(Method::POST, &self.url("/vouchers/bulk-delete"))
            .json(&BulkDeleteReq { ids });
        let resp = self.call(req, ErrorCtx::default()).await?;
        Ok(read_json::<BulkDeleteReportDto>(resp).await?.into())
    }
}
