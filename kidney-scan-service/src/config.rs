use std::path::PathBuf;

fn env_path(key: &str, default: &str) -> PathBuf {
    std::env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .into()
}

/// Runtime configuration, resolved once at startup from the environment.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub port: u16,
    /// Root of the statically served tree; uploads and localized images live under it
    pub static_dir: PathBuf,
    pub upload_dir: PathBuf,
    pub localized_dir: PathBuf,
    pub classifier_model: PathBuf,
    pub detector_model: PathBuf,
    pub risk_model: PathBuf,
    pub risk_scaler: PathBuf,
    pub knowledge_docs: PathBuf,
    pub knowledge_vectors: PathBuf,
}

impl ServiceConfig {
    pub fn from_env() -> Self {
        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .unwrap_or(3000);

        Self {
            port,
            static_dir: env_path("STATIC_DIR", "static"),
            upload_dir: env_path("UPLOAD_DIR", "static/uploaded"),
            localized_dir: env_path("LOCALIZED_DIR", "static/localized"),
            classifier_model: env_path("CLASSIFIER_MODEL", "models/kidney_classifier.onnx"),
            detector_model: env_path("DETECTOR_MODEL", "models/kidney_localizer.onnx"),
            risk_model: env_path("RISK_MODEL", "models/kidney_stone_risk.json"),
            risk_scaler: env_path("RISK_SCALER", "models/kidney_stone_scaler.json"),
            knowledge_docs: env_path("KNOWLEDGE_DOCS", "rag/index_documents.txt"),
            knowledge_vectors: env_path("KNOWLEDGE_VECTORS", "rag/index_vectors.json"),
        }
    }
}
