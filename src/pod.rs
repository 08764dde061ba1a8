use healthpod_core::{DirStore, Feature, FeatureDir, HttpStore, PodStore, RecordStore};

use crate::config::Config;

/// Record client over whichever pod the configuration points at.
pub type Client = RecordStore<Box<dyn PodStore>>;

/// Opens the configured pod: the remote server when a URL is set, otherwise
/// the local directory pod under the data directory.
pub fn open(config: &Config) -> Client {
    let store: Box<dyn PodStore> = match &config.pod.server_url {
        Some(url) => {
            tracing::debug!("Using remote pod at {}", url);
            Box::new(HttpStore::new(url.clone(), config.pod.api_key.clone()))
        }
        None => {
            let dir = config.local_pod_dir();
            tracing::debug!("Using local pod at {}", dir.display());
            Box::new(DirStore::new(dir))
        }
    };
    RecordStore::new(store)
}

pub fn feature_dir(config: &Config, feature: Feature) -> FeatureDir {
    FeatureDir::for_feature(&config.pod_root.value, feature)
}

