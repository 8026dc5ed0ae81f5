//! Client movement requests.

use super::{extract::ValidJson, field_str, into_record};
use crate::{
    error::{ApiError, ApiResult},
    middleware::{
        auth::{Auth, Principal},
        authz::{Capability, Role},
    },
    state::AppState,
    store::{Collection, Record},
};
use axum::{extract::State, http::StatusCode, Json};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use validator::Validate;

/// Subtypes accepted for `tipo = inclusao`.
pub const SUBTIPOS_INCLUSAO: [&str; 3] = ["funcionario", "socio", "dependente"];

/// Status of a freshly opened request.
pub const STATUS_INICIAL: &str = "aberta";

/// Body of `POST /api/solicitacoes`.
#[derive(Debug, Deserialize, Validate)]
pub struct NovaSolicitacao {
    /// Request category.
    #[validate(length(min = 1, message = "tipo is required"))]
    pub tipo: String,
    /// Category-specific subtype.
    pub subtipo: Option<String>,
    /// Company name.
    #[validate(length(min = 1, message = "razao_social is required"))]
    pub razao_social: String,
    /// Company tax id, digits or formatted.
    #[validate(length(min = 14, message = "cnpj must have at least 14 characters"))]
    pub cnpj: String,
    /// Whether the policy is already held through Belz.
    #[serde(default)]
    pub apolice_da_belz: bool,
    /// Health insurer.
    #[serde(default)]
    pub operadora: String,
    /// Free-text notes.
    #[serde(default)]
    pub observacoes: String,
    /// Target date for the request.
    pub sla_previsto: Option<NaiveDate>,
    /// Free-form payload specific to `tipo`.
    #[serde(default)]
    pub dados: Option<Value>,
}

impl NovaSolicitacao {
    /// `subtipo` as stored: required for inclusions, dropped otherwise.
    fn resolved_subtipo(&self) -> Result<Option<String>, ApiError> {
        if self.tipo != "inclusao" {
            return Ok(None);
        }
        match self.subtipo.as_deref() {
            Some(subtipo) if SUBTIPOS_INCLUSAO.contains(&subtipo) => Ok(Some(subtipo.to_string())),
            _ => Err(ApiError::BadRequest("invalid subtipo for inclusao".to_string())),
        }
    }

    fn into_record(self, criado_por: &str) -> Result<Record, ApiError> {
        let subtipo = self.resolved_subtipo()?;
        let now = Utc::now().to_rfc3339();

        Ok(into_record(json!({
            "tipo": self.tipo.trim(),
            "subtipo": subtipo,
            "razao_social": self.razao_social.trim(),
            "cnpj": self.cnpj.trim(),
            "apolice_da_belz": self.apolice_da_belz,
            "operadora": self.operadora.trim(),
            "observacoes": self.observacoes.trim(),
            "sla_previsto": self.sla_previsto,
            "dados": self.dados.unwrap_or_else(|| json!({})),
            "criado_por": criado_por,
            "status": STATUS_INICIAL,
            "historico": [{ "status": STATUS_INICIAL, "em": now, "usuario_id": criado_por }],
        })))
    }
}

/// Consultants see their own requests; movement analysts see the unassigned
/// ones and those assigned to them.
fn visible_to(principal: &Principal, solicitacao: &Record) -> bool {
    let id = Some(principal.id.as_str());
    match principal.role {
        Role::Consultor => field_str(solicitacao, "criado_por") == id,
        Role::AnalistaMovimentacao => {
            let atendido_por = solicitacao.get("atendido_por").filter(|v| !v.is_null());
            atendido_por.is_none() || atendido_por.and_then(Value::as_str) == id
        }
        _ => true,
    }
}

/// GET /api/solicitacoes
pub async fn list_solicitacoes(
    State(state): State<AppState>,
    Auth(principal): Auth,
) -> ApiResult<Json<Value>> {
    state
        .permissions()
        .require(&principal, Capability::ViewMovimentacao)?;

    let data: Vec<Value> = state
        .store()
        .list(Collection::Solicitacoes)
        .await?
        .into_iter()
        .filter(|row| visible_to(&principal, row))
        .map(Value::Object)
        .collect();

    Ok(Json(json!({ "total": data.len(), "data": data })))
}

/// POST /api/solicitacoes
pub async fn create_solicitacao(
    State(state): State<AppState>,
    Auth(principal): Auth,
    body: Result<ValidJson<NovaSolicitacao>, ApiError>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    state
        .permissions()
        .require(&principal, Capability::CreateSolicitacao)?;
    let ValidJson(req) = body?;

    let row = state
        .store()
        .insert(Collection::Solicitacoes, req.into_record(&principal.id)?)
        .await?;

    info!(
        solicitacao_id = field_str(&row, "id").unwrap_or_default(),
        user_id = %principal.id,
        "Movement request created"
    );
    Ok((StatusCode::CREATED, Json(json!({ "data": row }))))
}
