use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{SyncSender, sync_channel};
use std::thread;

use s3::creds::Credentials;
use s3::{Bucket, Region};

use crate::{MessageKind, ProgressMessage, UploadConfig, print_completed, print_progress};

const CONTENT_TYPE: &str = "text/csv";

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("凭证初始化失败: {0}")]
    Credentials(String),
    #[error("存储桶配置非法: {0}")]
    Bucket(String),
    #[error("列举对象失败: {0}")]
    Listing(String),
    #[error("删除对象 {key} 失败: {message}")]
    Deletion { key: String, message: String },
    #[error("上传 {file} 失败: {message}")]
    Upload { file: String, message: String },
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),
}

/// 同步任务：先清空前缀下的旧对象，再上传源目录内的文件
///
/// 两个阶段顺序执行，清理或上传途中出错立即返回，不回滚已完成的部分
pub fn run(config: &UploadConfig) -> Result<(), SyncError> {
    let bucket = open_bucket(config)?;

    tracing::info!("清理存储桶 {} 前缀 {} 下的旧对象", config.storage.bucket, config.prefix);
    let deleted = purge(&bucket, &config.prefix)?;
    tracing::info!("清理完成，共删除 {} 个对象", deleted);

    tracing::info!("开始上传目录 {}", config.source);
    let uploaded = upload_dir(&bucket, &config.prefix, Path::new(&config.source))?;

    print_completed(serde_json::json!({
        "status": "success",
        "deleted_objects": deleted,
        "uploaded_files": uploaded,
        "bucket": config.storage.bucket,
        "prefix": config.prefix,
    }));
    Ok(())
}

/// 环境变量里的凭证优先于配置字段
fn open_bucket(config: &UploadConfig) -> Result<Bucket, SyncError> {
    let storage = &config.storage;
    let region = Region::Custom {
        region: storage.region.clone(),
        endpoint: storage.endpoint.clone(),
    };
    let credentials = Credentials::from_env()
        .or_else(|_| Credentials::new(Some(&storage.access_key), Some(&storage.secret_key), None, None, None))
        .map_err(|err| SyncError::Credentials(err.to_string()))?;

    let mut bucket =
        Bucket::new(&storage.bucket, region, credentials).map_err(|err| SyncError::Bucket(err.to_string()))?;
    if storage.use_path_style {
        bucket = bucket.with_path_style();
    }
    Ok(*bucket)
}

/// 列举线程分页产出键名，当前线程逐个删除，单槽通道移交
fn purge(
    bucket: &Bucket,
    prefix: &str,
) -> Result<u64, SyncError> {
    let cancel = AtomicBool::new(false);
    let (sender, receiver) = sync_channel::<Result<String, SyncError>>(1);

    thread::scope(|scope| {
        scope.spawn(|| list_keys(bucket, prefix, sender, &cancel));

        let mut deleted = 0u64;
        for item in receiver {
            let key = match item {
                Ok(key) => key,
                Err(err) => {
                    cancel.store(true, Ordering::Relaxed);
                    return Err(err);
                }
            };

            tracing::info!("删除对象: {}", key);
            if let Err(err) = bucket.delete_object(&key) {
                // 删除失败立即终止，同时通知列举线程退出
                cancel.store(true, Ordering::Relaxed);
                return Err(SyncError::Deletion {
                    key,
                    message: err.to_string(),
                });
            }
            deleted += 1;
        }
        Ok(deleted)
    })
}

fn list_keys(
    bucket: &Bucket,
    prefix: &str,
    sender: SyncSender<Result<String, SyncError>>,
    cancel: &AtomicBool,
) {
    let mut continuation: Option<String> = None;

    loop {
        if cancel.load(Ordering::Relaxed) {
            return;
        }

        let (page, _) = match bucket.list_page(prefix.to_string(), None, continuation.take(), None, None) {
            Ok(page) => page,
            Err(err) => {
                let _ = sender.send(Err(SyncError::Listing(err.to_string())));
                return;
            }
        };

        for object in page.contents {
            if cancel.load(Ordering::Relaxed) {
                return;
            }
            // 接收端提前退出时结束列举
            if sender.send(Ok(object.key)).is_err() {
                return;
            }
        }

        match page.next_continuation_token {
            Some(token) => continuation = Some(token),
            None => return,
        }
    }
}

/// 上传源目录内的普通文件，首个失败即返回
fn upload_dir(
    bucket: &Bucket,
    prefix: &str,
    source: &Path,
) -> Result<u64, SyncError> {
    let mut uploaded = 0u64;

    for (name, path) in files_in_dir(source)? {
        let key = object_key(prefix, &name);
        let content = fs::read(&path)?;

        tracing::info!("上传 {} -> {}，{} 字节", name, key, content.len());
        bucket
            .put_object_with_content_type(&key, &content, CONTENT_TYPE)
            .map_err(|err| SyncError::Upload {
                file: name.clone(),
                message: err.to_string(),
            })?;

        print_progress(ProgressMessage {
            kind: MessageKind::Progress,
            data: serde_json::json!({
                "file": name,
                "key": key,
                "bytes": content.len(),
            }),
        });
        uploaded += 1;
    }
    Ok(uploaded)
}

fn object_key(
    prefix: &str,
    name: &str,
) -> String {
    format!("{}{}", prefix, name)
}

/// 源目录下的普通文件，按文件名排序，不进入子目录
fn files_in_dir(source: &Path) -> Result<Vec<(String, PathBuf)>, SyncError> {
    let mut files = vec![];
    for entry in fs::read_dir(source)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        files.push((entry.file_name().to_string_lossy().into_owned(), path));
    }
    files.sort();
    Ok(files)
}
