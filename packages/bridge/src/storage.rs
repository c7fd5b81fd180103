use async_trait::async_trait;
use skiff_core::{
    check_put_size, decode_reply, encode_request, Error, ExistsReply, HeadObjectReply,
    ListObjectsReply, ObjectInfo, ObjectReply, StorageProvider, StorageRequest,
};

use crate::host::{HostCalls, HostOp};

const BACKEND: &str = "bridge";

/// Storage adapter over the host import surface. Byte payloads travel fully
/// buffered inside the envelope; size limits belong to callers above this
/// layer.
pub struct BridgeStorage<H: HostCalls> {
    host: H,
}

impl<H: HostCalls> BridgeStorage<H> {
    pub fn new(host: H) -> Self {
        Self { host }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    fn run<T: serde::de::DeserializeOwned>(
        &self,
        op: HostOp,
        request: &StorageRequest,
    ) -> Result<T, Error> {
        let payload = encode_request(request)?;
        let reply = self
            .host
            .call(op, &payload)
            .map_err(|err| err.context(op.name()))?;
        decode_reply(&reply)
    }
}

#[cfg(target_arch = "wasm32")]
impl BridgeStorage<crate::host::WasmHost> {
    pub fn over_boundary() -> Self {
        Self::new(crate::host::WasmHost)
    }
}

#[async_trait(?Send)]
impl<H: HostCalls> StorageProvider for BridgeStorage<H> {
    fn backend_name(&self) -> &'static str {
        BACKEND
    }

    async fn create_bucket(&self, bucket: &str) -> Result<(), Error> {
        self.run(
            HostOp::StorageCreateBucket,
            &StorageRequest::CreateBucket {
                bucket: bucket.to_string(),
            },
        )
    }

    async fn bucket_exists(&self, bucket: &str) -> Result<bool, Error> {
        let reply: ExistsReply = self.run(
            HostOp::StorageBucketExists,
            &StorageRequest::BucketExists {
                bucket: bucket.to_string(),
            },
        )?;
        Ok(reply.exists)
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        bytes: &[u8],
        size: u64,
        content_type: Option<&str>,
    ) -> Result<(), Error> {
        check_put_size(bytes, size)?;
        self.run(
            HostOp::StoragePutObject,
            &StorageRequest::PutObject {
                bucket: bucket.to_string(),
                key: key.to_string(),
                data: bytes.to_vec(),
                content_type: content_type.map(|value| value.to_string()),
            },
        )
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, Error> {
        let reply: ObjectReply = self.run(
            HostOp::StorageGetObject,
            &StorageRequest::GetObject {
                bucket: bucket.to_string(),
                key: key.to_string(),
            },
        )?;
        Ok(reply.data)
    }

    async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectInfo, Error> {
        let reply: HeadObjectReply = self.run(
            HostOp::StorageHeadObject,
            &StorageRequest::HeadObject {
                bucket: bucket.to_string(),
                key: key.to_string(),
            },
        )?;
        Ok(reply.info)
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: Option<&str>,
    ) -> Result<Vec<ObjectInfo>, Error> {
        let reply: ListObjectsReply = self.run(
            HostOp::StorageListObjects,
            &StorageRequest::ListObjects {
                bucket: bucket.to_string(),
                prefix: prefix.map(|value| value.to_string()),
            },
        )?;
        Ok(reply.objects)
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), Error> {
        self.run(
            HostOp::StorageDeleteObject,
            &StorageRequest::DeleteObject {
                bucket: bucket.to_string(),
                key: key.to_string(),
            },
        )
    }

    // delete_bucket and presigned_url have no host import; the trait
    // defaults surface the stable unsupported error.
}
