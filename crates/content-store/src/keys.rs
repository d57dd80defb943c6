//! Key encoding helpers. Every tree keys its primary rows by an 8-byte
//! big-endian id so `Tree::iter`/`scan_prefix` return rows in id order, and
//! secondary-index trees key by the indexed value so lookups are a direct
//! point read rather than a scan.

use content_core::types::Id;

pub fn id_key(id: Id) -> [u8; 8] {
    id.to_be_bytes()
}

pub fn id_from_key(bytes: &[u8]) -> Id {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[..8]);
    Id::from_be_bytes(buf)
}

pub fn pub_interval_key(publication_id: Id, interval_label: &str) -> Vec<u8> {
    let mut key = id_key(publication_id).to_vec();
    key.push(b':');
    key.extend_from_slice(interval_label.as_bytes());
    key
}

pub fn creation_platform_key(creation_id: Id, platform: &str) -> Vec<u8> {
    let mut key = id_key(creation_id).to_vec();
    key.push(b':');
    key.extend_from_slice(platform.as_bytes());
    key
}

pub fn skill_metric_key(skill_name: &str, recorded_at_millis: i64, id: Id) -> Vec<u8> {
    let mut key = skill_name.as_bytes().to_vec();
    key.push(0);
    key.extend_from_slice(&recorded_at_millis.to_be_bytes());
    key.extend_from_slice(&id_key(id));
    key
}

pub fn skill_metric_prefix(skill_name: &str) -> Vec<u8> {
    let mut key = skill_name.as_bytes().to_vec();
    key.push(0);
    key
}

pub fn interaction_key(a: &str, b: &str) -> Vec<u8> {
    let mut key = a.as_bytes().to_vec();
    key.push(0);
    key.extend_from_slice(b.as_bytes());
    key
}
