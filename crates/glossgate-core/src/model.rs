use std::fmt;
use std::str::FromStr;

use crate::engine::CheckError;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(i64);

        impl $name {
            pub fn new(id: i64) -> Self {
                Self(id)
            }

            pub fn value(&self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(
    /// A human account.
    ActorId
);
id_type!(
    /// One authenticated session or device. Always belongs to exactly one actor.
    SessionId
);
id_type!(OrganizationId);
id_type!(TemplateId);
id_type!(GrantId);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: ActorId,
    pub active: bool,
    pub superuser: bool,
}

impl Actor {
    pub fn new(id: i64) -> Self {
        Self {
            id: ActorId(id),
            active: true,
            superuser: false,
        }
    }

    pub fn deactivated(mut self) -> Self {
        self.active = false;
        self
    }

    pub fn with_superuser(mut self) -> Self {
        self.superuser = true;
        self
    }
}

/// A reusable (subject type, action) permission definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionTemplate {
    pub id: TemplateId,
    pub subject: String,
    pub action: String,
    pub dictionary_default: bool,
    pub perspective_default: bool,
}

impl PermissionTemplate {
    pub fn new(id: i64, subject: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            id: TemplateId(id),
            subject: subject.into(),
            action: action.into(),
            dictionary_default: false,
            perspective_default: false,
        }
    }

    pub fn dictionary_default(mut self) -> Self {
        self.dictionary_default = true;
        self
    }

    pub fn perspective_default(mut self) -> Self {
        self.perspective_default = true;
        self
    }

    pub fn is_default_for(&self, kind: DefaultFor) -> bool {
        match kind {
            DefaultFor::Dictionary => self.dictionary_default,
            DefaultFor::Perspective => self.perspective_default,
        }
    }
}

/// Kind of subject instance whose creation attaches the default templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DefaultFor {
    Dictionary,
    Perspective,
}

/// Identifier of a subject instance created under a session scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CompositeId {
    pub client_id: i64,
    pub object_id: i64,
}

impl CompositeId {
    pub fn new(client_id: i64, object_id: i64) -> Self {
        Self {
            client_id,
            object_id,
        }
    }
}

impl fmt::Display for CompositeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.client_id, self.object_id)
    }
}

/// Which subject instances a grant applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GrantScope {
    /// Every instance of the subject type.
    Override,
    Object(i64),
    Composite(CompositeId),
}

impl GrantScope {
    pub fn covers(&self, target: &SubjectRef) -> bool {
        match (self, target) {
            (GrantScope::Override, _) => true,
            (GrantScope::Object(id), SubjectRef::Single(object_id)) => id == object_id,
            (GrantScope::Composite(scope), SubjectRef::Composite(target)) => scope == target,
            (GrantScope::Composite(scope), SubjectRef::Single(object_id)) => {
                scope.object_id == *object_id
            }
            _ => false,
        }
    }
}

/// A template instantiation joined with its template's subject and action.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Grant {
    pub id: GrantId,
    pub template: TemplateId,
    pub subject: String,
    pub action: String,
    pub scope: GrantScope,
}

impl Grant {
    pub fn new(id: i64, template: &PermissionTemplate, scope: GrantScope) -> Self {
        Self {
            id: GrantId(id),
            template: template.id,
            subject: template.subject.clone(),
            action: template.action.clone(),
            scope,
        }
    }
}

/// The subject instance a check is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubjectRef {
    Single(i64),
    Composite(CompositeId),
    /// The instance does not exist yet.
    Creation,
}

impl SubjectRef {
    pub fn composite(client_id: i64, object_id: i64) -> Self {
        SubjectRef::Composite(CompositeId::new(client_id, object_id))
    }
}

impl fmt::Display for SubjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubjectRef::Single(id) => write!(f, "{id}"),
            SubjectRef::Composite(id) => write!(f, "{id}"),
            SubjectRef::Creation => write!(f, "none"),
        }
    }
}

impl FromStr for SubjectRef {
    type Err = CheckError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unrecognized = || CheckError::UnrecognizedSubjectRef(s.to_string());
        let trimmed = s.trim();

        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
            return Ok(SubjectRef::Creation);
        }

        let parts: Vec<&str> = trimmed.split(':').collect();
        match parts.as_slice() {
            [object_id] => object_id
                .parse()
                .map(SubjectRef::Single)
                .map_err(|_| unrecognized()),
            [client_id, object_id] => {
                let client_id = client_id.parse().map_err(|_| unrecognized())?;
                let object_id = object_id.parse().map_err(|_| unrecognized())?;
                Ok(SubjectRef::composite(client_id, object_id))
            }
            _ => Err(unrecognized()),
        }
    }
}

impl TryFrom<&serde_json::Value> for SubjectRef {
    type Error = CheckError;

    fn try_from(value: &serde_json::Value) -> Result<Self, Self::Error> {
        use serde_json::Value;

        let unrecognized = || CheckError::UnrecognizedSubjectRef(value.to_string());

        match value {
            Value::Null => Ok(SubjectRef::Creation),
            Value::Number(n) => n.as_i64().map(SubjectRef::Single).ok_or_else(unrecognized),
            Value::Array(items) => match items.as_slice() {
                [client_id, object_id] => {
                    let client_id = client_id.as_i64().ok_or_else(unrecognized)?;
                    let object_id = object_id.as_i64().ok_or_else(unrecognized)?;
                    Ok(SubjectRef::composite(client_id, object_id))
                }
                _ => Err(unrecognized()),
            },
            _ => Err(unrecognized()),
        }
    }
}

/// Publication state of a perspective-like subject instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VisibilityState {
    Published,
    LimitedAccess,
    Draft,
    Hidden,
    Other(String),
}

impl VisibilityState {
    pub fn parse(state: &str) -> Self {
        match state {
            "Published" => VisibilityState::Published,
            "Limited access" => VisibilityState::LimitedAccess,
            "Draft" => VisibilityState::Draft,
            "Hidden" => VisibilityState::Hidden,
            other => VisibilityState::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            VisibilityState::Published => "Published",
            VisibilityState::LimitedAccess => "Limited access",
            VisibilityState::Draft => "Draft",
            VisibilityState::Hidden => "Hidden",
            VisibilityState::Other(state) => state,
        }
    }

    pub fn is_public(&self) -> bool {
        matches!(
            self,
            VisibilityState::Published | VisibilityState::LimitedAccess
        )
    }
}

impl fmt::Display for VisibilityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
