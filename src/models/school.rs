//! School model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::filters::SortKey;
use crate::validator::{is_email, is_phone, is_web_url, unique, Validator};

/// A school with contact details and its modes of delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct School {
    pub id: i64,
    #[serde(skip)]
    pub created_at: DateTime<Utc>,
    pub name: String,
    pub level: String,
    pub contact: String,
    pub phone: String,
    pub email: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub website: String,
    pub address: String,
    pub mode: Vec<String>,
    pub version: i64,
}

impl School {
    pub fn validate(&self, v: &mut Validator) {
        check_text(v, &self.name, "name", 200);
        check_text(v, &self.level, "level", 200);
        check_text(v, &self.contact, "contact", 200);

        v.check(!self.phone.is_empty(), "phone", "must be provided");
        v.check(is_phone(&self.phone), "phone", "must be a valid phone number");

        v.check(!self.email.is_empty(), "email", "must be provided");
        v.check(is_email(&self.email), "email", "must be a valid email address");

        if !self.website.is_empty() {
            v.check(is_web_url(&self.website), "website", "must be a valid URL");
        }

        check_text(v, &self.address, "address", 500);

        v.check(!self.mode.is_empty(), "mode", "must contain at least one entry");
        v.check(self.mode.len() <= 5, "mode", "must contain at most five entries");
        v.check(unique(&self.mode), "mode", "must not contain duplicate entries");
    }
}

fn check_text(v: &mut Validator, value: &str, field: &str, max: usize) {
    v.check(!value.is_empty(), field, "must be provided");
    v.check(
        value.len() <= max,
        field,
        &format!("must not be more than {max} bytes long"),
    );
}

/// Request body for creating a school.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateSchoolRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub level: String,
    #[serde(default)]
    pub contact: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub website: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub mode: Vec<String>,
}

impl From<CreateSchoolRequest> for School {
    fn from(request: CreateSchoolRequest) -> Self {
        Self {
            id: 0,
            created_at: Utc::now(),
            name: request.name,
            level: request.level,
            contact: request.contact,
            phone: request.phone,
            email: request.email,
            website: request.website,
            address: request.address,
            mode: request.mode,
            version: 1,
        }
    }
}

/// Request body for a partial school update.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateSchoolRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub contact: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub mode: Option<Vec<String>>,
}

impl UpdateSchoolRequest {
    pub fn apply(self, school: &mut School) {
        let fields = [
            (self.name, &mut school.name),
            (self.level, &mut school.level),
            (self.contact, &mut school.contact),
            (self.phone, &mut school.phone),
            (self.email, &mut school.email),
            (self.website, &mut school.website),
            (self.address, &mut school.address),
        ];
        for (value, slot) in fields {
            if let Some(value) = value {
                *slot = value;
            }
        }
        if let Some(mode) = self.mode {
            school.mode = mode;
        }
    }
}

/// Search criteria for the school listing.
#[derive(Debug, Clone, Default)]
pub struct SchoolSearch {
    pub name: String,
    pub level: String,
    pub mode: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchoolSort {
    Id,
    Name,
    Level,
}

impl SortKey for SchoolSort {
    const SAFELIST: &'static [&'static str] = &["id", "name", "level", "-id", "-name", "-level"];

    fn from_column(column: &str) -> Option<Self> {
        match column {
            "id" => Some(SchoolSort::Id),
            "name" => Some(SchoolSort::Name),
            "level" => Some(SchoolSort::Level),
            _ => None,
        }
    }

    fn column(self) -> &'static str {
        match self {
            SchoolSort::Id => "id",
            SchoolSort::Name => "name",
            SchoolSort::Level => "level",
        }
    }
}
