//! Proposal, event feed and movement request endpoints.

mod common;

use axum::http::{Method, StatusCode};
use belz_server::{middleware::authz::Role, store::Collection};
use common::*;
use futures::StreamExt;
use serde_json::json;
use std::time::Duration;

async fn seed_proposals(ctx: &TestContext) -> String {
    let consultor = principal(Role::Consultor);
    let own = ctx
        .insert(
            Collection::Propostas,
            json!({ "cliente": "ACME", "status": "em análise", "criado_por": consultor.id }),
        )
        .await;
    ctx.insert(
        Collection::Propostas,
        json!({ "cliente": "Outra", "status": "em análise", "criado_por": "u-x", "atendido_por": "u-y" }),
    )
    .await;
    own["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_list_proposals_by_role() {
    let ctx = TestContext::new();
    seed_proposals(&ctx).await;

    let response = ctx.send(get_as("/api/proposals", &ctx.bearer(Role::Gestor))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let rows = body_json(response).await;
    assert_eq!(rows.as_array().unwrap().len(), 2);
    assert!(rows[0].get("dias_em_analise").is_some());

    let response = ctx.send(get_as("/api/proposals", &ctx.bearer(Role::Consultor))).await;
    let rows = body_json(response).await;
    assert_eq!(rows.as_array().unwrap().len(), 1);
    assert_eq!(rows[0]["cliente"], "ACME");

    let response = ctx
        .send(get_as("/api/proposals", &ctx.bearer(Role::AnalistaMovimentacao)))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

fn patch_as(
    ctx: &TestContext,
    role: Role,
    uri: &str,
    body: serde_json::Value,
) -> axum::http::Request<axum::body::Body> {
    json_request(Method::PATCH, uri, Some(&ctx.bearer(role)), body)
}

fn nova_proposta() -> serde_json::Value {
    json!({
        "cnpj": "12345678000199",
        "operadora": "amil",
        "quantidade_vidas": 4,
        "valor": 2500.0,
        "cliente_nome": "ACME Ltda",
        "cliente_email": "RH@Acme.com.br",
    })
}

#[tokio::test]
async fn test_update_status() {
    let ctx = TestContext::new();
    let id = seed_proposals(&ctx).await;
    let uri = format!("/api/proposals/{}", id);

    let response = ctx
        .send(patch_as(&ctx, Role::Gerente, &uri, json!({ "status": "implantado" })))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let row = body_json(response).await;
    assert_eq!(row["status"], "implantado");
    assert_eq!(row["atualizado_por"], principal(Role::Gerente).id);
}

#[tokio::test]
async fn test_analyst_claims_then_updates() {
    let ctx = TestContext::new();
    let id = seed_proposals(&ctx).await;
    let uri = format!("/api/proposals/{}", id);
    let analista = principal(Role::AnalistaImplantacao);

    let response = ctx
        .send(patch_as(&ctx, Role::AnalistaImplantacao, &uri, json!({ "status": "implantando" })))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = ctx
        .send(patch_as(&ctx, Role::AnalistaImplantacao, &uri, json!({ "claim": true })))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let row = body_json(response).await;
    assert_eq!(row["atendido_por"], analista.id);
    assert!(row["atendido_em"].is_string());
    assert_eq!(row["status"], "em análise");

    let response = ctx
        .send(patch_as(&ctx, Role::AnalistaImplantacao, &uri, json!({ "claim": true })))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "proposta already assigned");

    let response = ctx
        .send(patch_as(&ctx, Role::AnalistaImplantacao, &uri, json!({ "status": "implantando" })))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "implantando");

    let response = ctx
        .send(get_as("/api/proposals", &ctx.bearer(Role::AnalistaImplantacao)))
        .await;
    let rows = body_json(response).await;
    assert_eq!(rows.as_array().unwrap().len(), 1);
    assert_eq!(rows[0]["atendido_por"], analista.id);
}

#[tokio::test]
async fn test_analyst_update_of_own_unassigned_proposal_claims_it() {
    let ctx = TestContext::new();
    let analista = principal(Role::AnalistaImplantacao);
    let row = ctx
        .insert(
            Collection::Propostas,
            json!({ "status": "em análise", "criado_por": analista.id, "atendido_por": null }),
        )
        .await;
    let uri = format!("/api/proposals/{}", row["id"].as_str().unwrap());

    let response = ctx
        .send(patch_as(&ctx, Role::AnalistaImplantacao, &uri, json!({ "status": "boleto liberado" })))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let row = body_json(response).await;
    assert_eq!(row["atendido_por"], analista.id);
    assert_eq!(row["status"], "boleto liberado");
}

#[tokio::test]
async fn test_create_proposal_as_consultor() {
    let ctx = TestContext::new();
    let consultor = principal(Role::Consultor);
    let mut body = nova_proposta();
    body["status"] = json!("implantado");

    let response = ctx
        .send(json_request(Method::POST, "/api/proposals", Some(&ctx.bearer(Role::Consultor)), body))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let row = body_json(response).await;
    assert_eq!(row["criado_por"], consultor.id);
    assert_eq!(row["status"], "em análise");
    assert_eq!(row["consultor"], "Consultor");
    assert_eq!(row["consultor_email"], consultor.email);
    assert_eq!(row["cliente_email"], "rh@acme.com.br");
    assert!(row["atendido_por"].is_null());

    let response = ctx.send(get_as("/api/proposals", &ctx.bearer(Role::Consultor))).await;
    let rows = body_json(response).await;
    assert_eq!(rows.as_array().unwrap().len(), 1);

    let response = ctx
        .send(get_as("/api/proposals", &ctx.bearer(Role::AnalistaImplantacao)))
        .await;
    assert_eq!(body_json(response).await.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_create_proposal_rejections() {
    let ctx = TestContext::new();

    let mut no_client = nova_proposta();
    no_client.as_object_mut().unwrap().remove("cliente_email");
    let response = ctx
        .send(json_request(Method::POST, "/api/proposals", Some(&ctx.bearer(Role::Consultor)), no_client))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = ctx
        .send(json_request(Method::POST, "/api/proposals", Some(&ctx.bearer(Role::Gerente)), nova_proposta()))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await["error"],
        "consultor and consultor_email are required"
    );

    let response = ctx
        .send(json_request(
            Method::POST,
            "/api/proposals",
            Some(&ctx.bearer(Role::AnalistaCliente)),
            nova_proposta(),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(ctx.store.len(Collection::Propostas), 0);
}

#[tokio::test]
async fn test_gerente_creates_for_named_consultant() {
    let ctx = TestContext::new();
    let mut body = nova_proposta();
    body["consultor"] = json!("Carla");
    body["consultor_email"] = json!("Carla@Belz.com.br");
    body["criado_por"] = json!("u-someone-else");

    let response = ctx
        .send(json_request(Method::POST, "/api/proposals", Some(&ctx.bearer(Role::Gerente)), body))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let row = body_json(response).await;
    assert_eq!(row["criado_por"], principal(Role::Gerente).id);
    assert_eq!(row["consultor_email"], "carla@belz.com.br");
}

#[tokio::test]
async fn test_update_is_throttled_per_user() {
    let mut config = test_config();
    config.rate_limit.max_attempts = 2;
    let ctx = TestContext::with_config(config);
    let id = seed_proposals(&ctx).await;
    let uri = format!("/api/proposals/{}", id);

    for status in ["implantando", "implantado"] {
        let response = ctx
            .send(patch_as(&ctx, Role::Gestor, &uri, json!({ "status": status })))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = ctx
        .send(patch_as(&ctx, Role::Gestor, &uri, json!({ "status": "negado" })))
        .await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().get(axum::http::header::RETRY_AFTER).is_some());
    assert_security_headers(&response);

    let response = ctx
        .send(patch_as(&ctx, Role::Gerente, &uri, json!({ "status": "negado" })))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_update_status_rejections() {
    let ctx = TestContext::new();
    let id = seed_proposals(&ctx).await;
    let uri = format!("/api/proposals/{}", id);

    let response = ctx
        .send(json_request(
            Method::PATCH,
            &uri,
            Some(&ctx.bearer(Role::Consultor)),
            json!({ "status": "implantado" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = ctx
        .send(json_request(
            Method::PATCH,
            &uri,
            Some(&ctx.bearer(Role::Gestor)),
            json!({ "status": "aprovado" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = ctx
        .send(json_request(
            Method::PATCH,
            "/api/proposals/does-not-exist",
            Some(&ctx.bearer(Role::Gestor)),
            json!({ "status": "negado" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = ctx
        .send(patch_as(&ctx, Role::Gestor, &uri, json!({ "criado_por": "u-x", "status": "negado" })))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = ctx
        .send(patch_as(&ctx, Role::Gestor, &uri, json!({ "claim": true })))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "status is required");
}

#[tokio::test]
async fn test_delete_is_gestor_only() {
    let ctx = TestContext::new();
    let id = seed_proposals(&ctx).await;
    let uri = format!("/api/proposals/{}", id);

    let delete = |authorization: String| {
        axum::http::Request::builder()
            .method(Method::DELETE)
            .uri(uri.as_str())
            .header(axum::http::header::AUTHORIZATION, authorization)
            .body(axum::body::Body::empty())
            .unwrap()
    };

    let response = ctx.send(delete(ctx.bearer(Role::Gerente))).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(ctx.store.len(Collection::Propostas), 2);

    let response = ctx.send(delete(ctx.bearer(Role::Gestor))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(ctx.store.len(Collection::Propostas), 1);

    let response = ctx.send(delete(ctx.bearer(Role::Gestor))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_row_level_denial_is_403() {
    let ctx = TestContext::new();
    ctx.store.deny(Collection::Propostas);

    let response = ctx.send(get_as("/api/proposals", &ctx.bearer(Role::Gestor))).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        body_json(response).await["error"],
        "permission denied for table propostas"
    );
}

#[tokio::test]
async fn test_event_feed_streams_status_changes() {
    let ctx = TestContext::new();
    let id = seed_proposals(&ctx).await;

    let response = ctx
        .send(get_as("/api/proposals/events", &ctx.bearer(Role::Gerente)))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[axum::http::header::CONTENT_TYPE],
        "text/event-stream"
    );
    assert_security_headers(&response);
    assert_eq!(ctx.state.events().subscriber_count(), 1);

    let mut body = response.into_body().into_data_stream();
    let first = tokio::time::timeout(Duration::from_secs(5), body.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(String::from_utf8_lossy(&first).contains("event: ready"));

    let response = ctx
        .send(json_request(
            Method::PATCH,
            &format!("/api/proposals/{}", id),
            Some(&ctx.bearer(Role::Gestor)),
            json!({ "status": "boleto liberado" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let update = tokio::time::timeout(Duration::from_secs(5), body.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let update = String::from_utf8_lossy(&update);
    assert!(update.contains("event: proposta_update"));
    assert!(update.contains("boleto liberado"));
    assert!(update.contains(&id));
}

#[tokio::test]
async fn test_event_feed_requires_view_permission() {
    let ctx = TestContext::new();

    let response = ctx.send(get("/api/proposals/events")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = ctx
        .send(get_as("/api/proposals/events", &ctx.bearer(Role::AnalistaCliente)))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(ctx.state.events().subscriber_count(), 0);
}

#[tokio::test]
async fn test_create_and_list_solicitacoes() {
    let ctx = TestContext::new();
    let consultor = ctx.bearer(Role::Consultor);

    let response = ctx
        .send(json_request(
            Method::POST,
            "/api/solicitacoes",
            Some(&consultor),
            json!({
                "tipo": "inclusao",
                "subtipo": "dependente",
                "razao_social": "ACME Ltda",
                "cnpj": "12345678000199",
                "apolice_da_belz": true,
                "sla_previsto": "2030-01-15",
            }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["data"]["criado_por"], principal(Role::Consultor).id);
    assert_eq!(body["data"]["status"], "aberta");
    assert_eq!(body["data"]["sla_previsto"], "2030-01-15");

    ctx.insert(Collection::Solicitacoes, json!({ "criado_por": "u-x", "atendido_por": "u-y" }))
        .await;

    let response = ctx.send(get_as("/api/solicitacoes", &consultor)).await;
    assert_eq!(body_json(response).await["total"], 1);

    let response = ctx.send(get_as("/api/solicitacoes", &ctx.bearer(Role::Gerente))).await;
    assert_eq!(body_json(response).await["total"], 2);

    let response = ctx
        .send(get_as("/api/solicitacoes", &ctx.bearer(Role::AnalistaMovimentacao)))
        .await;
    assert_eq!(body_json(response).await["total"], 1);
}

#[tokio::test]
async fn test_solicitacao_rejections() {
    let ctx = TestContext::new();

    let response = ctx
        .send(json_request(
            Method::POST,
            "/api/solicitacoes",
            Some(&ctx.bearer(Role::AnalistaImplantacao)),
            json!({ "tipo": "exclusao", "razao_social": "ACME", "cnpj": "12345678000199" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = ctx
        .send(json_request(
            Method::POST,
            "/api/solicitacoes",
            Some(&ctx.bearer(Role::Consultor)),
            json!({ "tipo": "inclusao", "subtipo": "estagiario", "razao_social": "ACME", "cnpj": "12345678000199" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(ctx.store.len(Collection::Solicitacoes), 0);
}
