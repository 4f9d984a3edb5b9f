use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CreateUser {
    #[validate(required)]
    pub name: String,
    pub age: u32,
    #[serde(rename = "isAdmin")]
    pub admin: bool,
    #[serde(skip)]
    pub internal_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct User {
    /// Unique identifier
    pub id: u64,
    pub name: String,
    pub friends: Vec<User>,
}

pub struct UserRepo;

impl UserRepo {
    pub fn create(&self, req: &CreateUser) -> Result<User, String> {
        unimplemented!()
    }
}

/// Creates a user
/// Persists the payload and returns the stored record
/// @param tenant path string true "Tenant identifier"
pub fn create_user(ctx: &mut Context) {
    let mut req: CreateUser = Default::default();
    if ctx.bind_json(&mut req).is_err() {
        ctx.string(400, "invalid payload");
        return;
    }

    let repo = UserRepo;
    let user = repo.create(&req);
    ctx.json(StatusCode::CREATED, user);
}

/// Health probe
pub fn health(ctx: &mut Context) {
    ctx.string(200, "ok");
}

/// Deletes a user
pub fn delete_user(ctx: &mut Context) {
    ctx.no_content(204);
}
