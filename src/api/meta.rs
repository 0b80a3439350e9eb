//! Service information and health check

use crate::infrastructure::config::Settings;
use axum::Json;
use di_axum::Inject;
use serde::Serialize;

#[derive(Serialize, Debug)]
pub struct ServiceInfo {
    pub name: String,
    pub version: String,
    pub description: &'static str,
    pub health: &'static str,
    pub api: Endpoints,
}

#[derive(Serialize, Debug)]
pub struct Endpoints {
    pub conversations: &'static str,
    pub chat: &'static str,
}

#[derive(Serialize, Debug)]
pub struct Health {
    pub status: &'static str,
    pub service: String,
    pub version: String,
}

pub async fn index(Inject(settings): Inject<Settings>) -> Json<ServiceInfo> {
    Json(ServiceInfo {
        name: settings.app_name.clone(),
        version: settings.app_version.clone(),
        description: "Cloud Advisor API - conversation history and chat relay",
        health: "/health",
        api: Endpoints {
            conversations: "/api/conversations",
            chat: "/api/chat",
        },
    })
}

pub async fn health(Inject(settings): Inject<Settings>) -> Json<Health> {
    Json(Health {
        status: "healthy",
        service: settings.app_name.clone(),
        version: settings.app_version.clone(),
    })
}
