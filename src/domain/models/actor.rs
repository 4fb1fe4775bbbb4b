use serde::Serialize;

/// The identity performing a state-changing action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "role", content = "id", rename_all = "snake_case")]
pub enum Actor {
    Client(String),
    BusinessOwner(String),
}

impl Actor {
    pub fn id(&self) -> &str {
        match self {
            Actor::Client(id) | Actor::BusinessOwner(id) => id,
        }
    }

    pub fn role(&self) -> &'static str {
        match self {
            Actor::Client(_) => "client",
            Actor::BusinessOwner(_) => "business_owner",
        }
    }
}

/// Bearer token claims. `role` is `client` or `business_owner`.
#[derive(Debug, Serialize, serde::Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub exp: usize,
}

impl Claims {
    pub fn into_actor(self) -> Option<Actor> {
        match self.role.as_str() {
            "client" => Some(Actor::Client(self.sub)),
            "business_owner" => Some(Actor::BusinessOwner(self.sub)),
            _ => None,
        }
    }
}
