//! Proposal endpoints and the live update feed.

use super::{extract::ValidJson, field_str, into_record};
use crate::{
    error::{ApiError, ApiResult},
    events::{ProposalEvent, PROPOSTA_UPDATE},
    middleware::{
        auth::{Auth, Principal},
        authz::{Capability, Role},
    },
    state::AppState,
    store::{Collection, Record},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use std::convert::Infallible;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use validator::{Validate, ValidationError};

/// Known proposal statuses.
pub const STATUS_OPTIONS: [&str; 8] = [
    "em análise",
    "pendencias seguradora",
    "boleto liberado",
    "implantando",
    "pendente cliente",
    "pleito seguradora",
    "negado",
    "implantado",
];

/// Status every proposal opened by a consultant starts in.
pub const STATUS_INICIAL: &str = "em análise";

/// Body of `POST /api/proposals`.
#[derive(Debug, Deserialize, Validate)]
pub struct NovaProposta {
    /// Company tax id.
    #[validate(length(min = 14))]
    pub cnpj: String,
    /// Health insurer.
    #[validate(length(min = 1))]
    pub operadora: String,
    /// Number of covered lives.
    #[validate(range(min = 1))]
    pub quantidade_vidas: u32,
    /// Monthly value.
    #[validate(range(min = 0.01))]
    pub valor: f64,
    /// Initial status; consultants always start at `em análise`.
    #[serde(default = "default_status")]
    #[validate(custom(function = "validate_status"))]
    pub status: String,
    /// Consultant name. Required unless a consultant is creating.
    #[validate(length(min = 2))]
    pub consultor: Option<String>,
    /// Consultant email. Required unless a consultant is creating.
    #[validate(email)]
    pub consultor_email: Option<String>,
    /// Client name. Required when a consultant is creating.
    #[validate(length(min = 2))]
    pub cliente_nome: Option<String>,
    /// Client email. Required when a consultant is creating.
    #[validate(email)]
    pub cliente_email: Option<String>,
    /// Expected go-live; must not be in the past.
    #[validate(custom(function = "validate_not_past"))]
    pub previsao_implantacao: Option<NaiveDate>,
    /// Notes visible to the client.
    #[serde(default)]
    pub observacoes_cliente: Option<String>,
    /// Only honoured for gestores; everyone else is recorded as the author.
    #[serde(default)]
    pub criado_por: Option<String>,
}

fn default_status() -> String {
    STATUS_INICIAL.to_string()
}

fn validate_not_past(date: &NaiveDate) -> Result<(), ValidationError> {
    if *date < Utc::now().date_naive() {
        return Err(ValidationError::new("date_in_past"));
    }
    Ok(())
}

/// Body of `PATCH /api/proposals/:id`.
///
/// `claim: true` from an analyst assigns the proposal to them and ignores
/// the rest; otherwise `status` is required.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProposalRequest {
    /// Assign the proposal to the calling analyst.
    #[serde(default)]
    pub claim: bool,
    /// New status.
    #[validate(custom(function = "validate_status"))]
    pub status: Option<String>,
    /// Present only to be rejected; ownership cannot change.
    #[serde(default)]
    pub criado_por: Option<Value>,
}

fn validate_status(status: &str) -> Result<(), ValidationError> {
    if STATUS_OPTIONS.contains(&status) {
        Ok(())
    } else {
        Err(ValidationError::new("unknown_status"))
    }
}

/// Lowercased, trimmed email.
fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Whether `principal` may see `proposta` once the capability check passed.
///
/// Consultants see what they opened or what names them; implementation
/// analysts see their own, their assigned and the unassigned ones.
fn visible_to(principal: &Principal, proposta: &Record) -> bool {
    let id = Some(principal.id.as_str());
    match principal.role {
        Role::Consultor => {
            field_str(proposta, "criado_por") == id
                || field_str(proposta, "consultor_email") == Some(principal.email.as_str())
        }
        Role::AnalistaImplantacao => {
            let atendido_por = proposta.get("atendido_por").filter(|v| !v.is_null());
            field_str(proposta, "criado_por") == id
                || atendido_por.is_none()
                || atendido_por.and_then(Value::as_str) == id
        }
        _ => true,
    }
}

/// Whole days since `created_at`, if it parses.
fn dias_em_analise(proposta: &Record, now: DateTime<Utc>) -> Option<i64> {
    let created = field_str(proposta, "created_at")?;
    let created = DateTime::parse_from_rfc3339(created).ok()?;
    Some((now - created.with_timezone(&Utc)).num_days())
}

/// GET /api/proposals
pub async fn list_proposals(
    State(state): State<AppState>,
    Auth(principal): Auth,
) -> ApiResult<Json<Vec<Value>>> {
    state.permissions().require(&principal, Capability::ViewPropostas)?;

    let now = Utc::now();
    let rows = state
        .store()
        .list(Collection::Propostas)
        .await?
        .into_iter()
        .filter(|row| visible_to(&principal, row))
        .map(|mut row| {
            let dias = dias_em_analise(&row, now);
            row.insert("dias_em_analise".to_string(), json!(dias));
            Value::Object(row)
        })
        .collect();

    Ok(Json(rows))
}

/// POST /api/proposals
///
/// Consultants open proposals in [`STATUS_INICIAL`] under their own name and
/// must name the client; everyone else must name the consultant.
pub async fn create_proposal(
    State(state): State<AppState>,
    Auth(principal): Auth,
    body: Result<ValidJson<NovaProposta>, ApiError>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    state.permissions().require(&principal, Capability::ViewPropostas)?;
    let ValidJson(req) = body?;

    let (status, consultor, consultor_email) = if principal.role == Role::Consultor {
        if req.cliente_nome.is_none() || req.cliente_email.is_none() {
            return Err(ApiError::BadRequest(
                "cliente_nome and cliente_email are required".to_string(),
            ));
        }
        let nome = consultor_name(&state, &principal).await?;
        (STATUS_INICIAL.to_string(), nome, principal.email.clone())
    } else {
        match (req.consultor, req.consultor_email.as_deref()) {
            (Some(nome), Some(email)) => (req.status, nome, normalize_email(email)),
            _ => {
                return Err(ApiError::BadRequest(
                    "consultor and consultor_email are required".to_string(),
                ))
            }
        }
    };

    let criado_por = match req.criado_por.filter(|id| !id.trim().is_empty()) {
        Some(id) if principal.role == Role::Gestor => id,
        _ => principal.id.clone(),
    };

    let row = state
        .store()
        .insert(
            Collection::Propostas,
            into_record(json!({
                "cnpj": req.cnpj,
                "operadora": req.operadora,
                "quantidade_vidas": req.quantidade_vidas,
                "valor": req.valor,
                "status": status,
                "consultor": consultor,
                "consultor_email": consultor_email,
                "cliente_nome": req.cliente_nome,
                "cliente_email": req.cliente_email.as_deref().map(normalize_email),
                "previsao_implantacao": req.previsao_implantacao,
                "observacoes_cliente": req.observacoes_cliente,
                "criado_por": criado_por,
                "atendido_por": null,
                "atendido_em": null,
            })),
        )
        .await?;

    let id = field_str(&row, "id").unwrap_or_default().to_string();
    let row = Value::Object(row);
    publish_update(&state, &id, &status, &principal, &row);

    info!(proposta_id = %id, user_id = %principal.id, "Proposal created");
    Ok((StatusCode::CREATED, Json(row)))
}

async fn consultor_name(state: &AppState, principal: &Principal) -> ApiResult<String> {
    let user = state.store().get(Collection::Usuarios, &principal.id).await?;
    let nome = user
        .as_ref()
        .and_then(|u| field_str(u, "nome"))
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or("Consultor");
    Ok(nome.to_string())
}

fn publish_update(state: &AppState, id: &str, status: &str, principal: &Principal, row: &Value) {
    let event = ProposalEvent::status_changed(id, status, &principal.id).with_record(row.clone());
    state.events().publish(event);
}

/// PATCH /api/proposals/:id
///
/// Gestores and gerentes may change any proposal. An implementation analyst
/// may change only the proposals assigned to them; one they opened and
/// nobody has picked up is assigned to them on the way.
pub async fn update_proposal(
    State(state): State<AppState>,
    Auth(principal): Auth,
    Path(id): Path<String>,
    body: Result<ValidJson<UpdateProposalRequest>, ApiError>,
) -> ApiResult<Json<Value>> {
    state
        .permissions()
        .require(&principal, Capability::EditPropostasStatus)?;
    state
        .limiter()
        .enforce(&format!("proposal-update:{}", principal.id))?;
    let ValidJson(req) = body?;

    if req.criado_por.is_some() {
        return Err(ApiError::BadRequest("criado_por cannot be changed".to_string()));
    }
    if req.claim && principal.role.is_analyst() {
        return claim_proposal(&state, &principal, &id).await;
    }
    let status = req
        .status
        .ok_or_else(|| ApiError::BadRequest("status is required".to_string()))?;

    let current = state
        .store()
        .get(Collection::Propostas, &id)
        .await?
        .ok_or_else(|| ApiError::NotFound("proposta".to_string()))?;

    let mut patch = into_record(json!({
        "status": status,
        "atualizado_por": principal.id,
    }));

    if !matches!(principal.role, Role::Gestor | Role::Gerente) {
        let atendido_por = assignee(&current);
        let own = Some(principal.id.as_str());
        if atendido_por.is_none() && field_str(&current, "criado_por") == own {
            patch.insert("atendido_por".to_string(), json!(principal.id));
            patch.insert("atendido_em".to_string(), json!(Utc::now().to_rfc3339()));
        } else if atendido_por != own {
            warn!(
                proposta_id = %id,
                user_id = %principal.id,
                "Proposal update by non-assignee refused"
            );
            return Err(ApiError::Forbidden(
                "not allowed to change this proposal".to_string(),
            ));
        }
    }

    let row = state
        .store()
        .update(Collection::Propostas, &id, patch)
        .await?
        .ok_or_else(|| ApiError::NotFound("proposta".to_string()))?;

    let row = Value::Object(row);
    publish_update(&state, &id, &status, &principal, &row);

    info!(proposta_id = %id, status = %status, user_id = %principal.id, "Proposal status changed");
    Ok(Json(row))
}

/// Non-null `atendido_por`.
fn assignee(proposta: &Record) -> Option<&str> {
    proposta.get("atendido_por").and_then(Value::as_str)
}

async fn claim_proposal(
    state: &AppState,
    principal: &Principal,
    id: &str,
) -> ApiResult<Json<Value>> {
    let current = state
        .store()
        .get(Collection::Propostas, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("proposta".to_string()))?;

    if assignee(&current).is_some() {
        return Err(ApiError::BadRequest("proposta already assigned".to_string()));
    }

    let row = state
        .store()
        .update(
            Collection::Propostas,
            id,
            into_record(json!({
                "atendido_por": principal.id,
                "atendido_em": Utc::now().to_rfc3339(),
            })),
        )
        .await?
        .ok_or_else(|| ApiError::NotFound("proposta".to_string()))?;

    let status = field_str(&row, "status").unwrap_or_default().to_string();
    let row = Value::Object(row);
    publish_update(state, id, &status, principal, &row);

    info!(proposta_id = %id, user_id = %principal.id, "Proposal claimed");
    Ok(Json(row))
}

/// DELETE /api/proposals/:id
pub async fn delete_proposal(
    State(state): State<AppState>,
    Auth(principal): Auth,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    state
        .permissions()
        .require(&principal, Capability::DeletePropostas)?;

    if !state.store().delete(Collection::Propostas, &id).await? {
        return Err(ApiError::NotFound("proposta".to_string()));
    }

    info!(proposta_id = %id, user_id = %principal.id, "Proposal deleted");
    Ok(Json(json!({ "success": true })))
}

/// GET /api/proposals/events
///
/// Server-sent events: `ready` once, then one `proposta_update` per change.
/// Subscribers that fall behind skip the missed updates.
pub async fn events(
    State(state): State<AppState>,
    Auth(principal): Auth,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    state.permissions().require(&principal, Capability::ViewPropostas)?;

    let rx = state.events().subscribe();
    debug!(user_id = %principal.id, "Proposal feed subscribed");

    let ready = stream::once(async {
        Ok::<_, Infallible>(Event::default().event("ready").data("{}"))
    });
    let updates = stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(update) => match Event::default().event(PROPOSTA_UPDATE).json_data(&update) {
                    Ok(event) => return Some((Ok::<_, Infallible>(event), rx)),
                    Err(err) => warn!(error = %err, "Dropping unserializable proposal event"),
                },
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "Proposal feed subscriber lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });

    Ok(Sse::new(ready.chain(updates)).keep_alive(KeepAlive::default()))
}
