//! Key layout for the ledger partitions.
//!
//! - `tenants`:  tenant:{id}  -> Tenant (JSON)
//! - `sources`:  source:{id}  -> Source (JSON)
//! - `jobs`:     job:{id}     -> ArchiveJob (JSON)
//! - `objects`:  object:{id}  -> ArchivedObject (JSON)

use uuid::Uuid;

pub fn encode_tenant_key(id: Uuid) -> Vec<u8> {
    format!("tenant:{id}").into_bytes()
}

pub fn encode_source_key(id: Uuid) -> Vec<u8> {
    format!("source:{id}").into_bytes()
}

pub fn encode_job_key(id: Uuid) -> Vec<u8> {
    format!("job:{id}").into_bytes()
}

pub fn encode_object_key(id: Uuid) -> Vec<u8> {
    format!("object:{id}").into_bytes()
}
