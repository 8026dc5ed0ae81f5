//! User records and seeding.

use super::r#trait::{Collection, Record, RecordStore};
use crate::middleware::{auth::hash_password, authz::Role};
use belz_common_secret::SecretString;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use validator::{Validate, ValidationError};

/// Shortest accepted password.
pub const MIN_PASSWORD_LEN: usize = 8;

/// A user account to create.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewUser {
    /// Display name.
    #[validate(length(min = 1, message = "nome is required"))]
    pub nome: String,
    /// Login email.
    #[validate(email)]
    pub email: String,
    /// Plain password; hashed before it is stored.
    #[validate(custom(function = "validate_password"))]
    pub senha: SecretString,
    /// Role wire name, see [`Role`].
    #[validate(custom(function = "validate_role"))]
    pub tipo_usuario: String,
}

fn validate_password(senha: &SecretString) -> Result<(), ValidationError> {
    if senha.expose().chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::new("password_too_short"));
    }
    Ok(())
}

fn validate_role(tipo: &str) -> Result<(), ValidationError> {
    tipo.parse::<Role>()
        .map(|_| ())
        .map_err(|_| ValidationError::new("unknown_role"))
}

impl NewUser {
    /// Account for `role` with the given credentials.
    pub fn new(
        nome: impl Into<String>,
        email: impl Into<String>,
        senha: impl Into<SecretString>,
        role: Role,
    ) -> Self {
        Self {
            nome: nome.into(),
            email: email.into(),
            senha: senha.into(),
            tipo_usuario: role.as_str().to_string(),
        }
    }

    /// Normalized login email.
    pub fn normalized_email(&self) -> String {
        self.email.trim().to_lowercase()
    }

    /// Build the stored row, hashing the password.
    pub fn into_record(self) -> anyhow::Result<Record> {
        let role: Role = self.tipo_usuario.parse()?;
        let senha_hash = hash_password(self.senha.expose())?;

        let Value::Object(record) = json!({
            "nome": self.nome.trim(),
            "email": self.normalized_email(),
            "senha_hash": senha_hash,
            "tipo_usuario": role,
            "ativo": true,
        }) else {
            anyhow::bail!("user record is not an object");
        };
        Ok(record)
    }
}

/// Strip credential material from a stored user row.
pub fn public_user(mut record: Record) -> Record {
    record.remove("senha_hash");
    record
}

/// Insert `user` unless a user with the same email exists.
///
/// Returns the stored row either way, without its password hash.
pub async fn seed_user(store: &dyn RecordStore, user: NewUser) -> anyhow::Result<Record> {
    let email = user.normalized_email();
    if let Some(existing) = store
        .find_one(Collection::Usuarios, "email", &Value::String(email.clone()))
        .await?
    {
        return Ok(public_user(existing));
    }

    let row = store.insert(Collection::Usuarios, user.into_record()?).await?;
    info!(email = %email, "Seeded user");
    Ok(public_user(row))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::auth::verify_password;
    use crate::store::InMemoryStore;

    #[test]
    fn test_validation() {
        let ok = NewUser::new("Ana", "ana@belz.com.br", "senha-segura", Role::Gestor);
        assert!(ok.validate().is_ok());

        let short = NewUser::new("Ana", "ana@belz.com.br", "curta", Role::Gestor);
        assert!(short.validate().is_err());

        let bad_email = NewUser::new("Ana", "not-an-email", "senha-segura", Role::Gestor);
        assert!(bad_email.validate().is_err());

        let mut bad_role = NewUser::new("Ana", "ana@belz.com.br", "senha-segura", Role::Gestor);
        bad_role.tipo_usuario = "admin".to_string();
        assert!(bad_role.validate().is_err());
    }

    #[test]
    fn test_into_record_hashes_password() {
        let record = NewUser::new(" Ana ", "Ana@Belz.com.br", "senha-segura", Role::Consultor)
            .into_record()
            .unwrap();

        assert_eq!(record["nome"], "Ana");
        assert_eq!(record["email"], "ana@belz.com.br");
        assert_eq!(record["tipo_usuario"], "consultor");
        let hash = record["senha_hash"].as_str().unwrap();
        assert!(verify_password("senha-segura", hash));
        assert!(!record.contains_key("senha"));
    }

    #[tokio::test]
    async fn test_seed_user_is_idempotent() {
        let store = InMemoryStore::new();
        let first = seed_user(
            &store,
            NewUser::new("Ana", "ana@belz.com.br", "senha-segura", Role::Gestor),
        )
        .await
        .unwrap();
        let second = seed_user(
            &store,
            NewUser::new("Ana", "ANA@belz.com.br", "outra-senha", Role::Gestor),
        )
        .await
        .unwrap();

        assert_eq!(first["id"], second["id"]);
        assert!(!first.contains_key("senha_hash"));
        assert_eq!(store.len(Collection::Usuarios), 1);
    }
}
