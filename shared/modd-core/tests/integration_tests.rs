use modd_core::{
    ContainerKind, HashPolicy, MetadataRecord, ModdDecoder, ModdError, RecordSet, SidecarScanner,
    VideoAssociator, VideoIndex,
};
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::fs;

fn sidecar_text(check_code: &str, file_size: u64) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\
         <plist version=\"1.0\"><dict><key>MetaDataList</key><array><dict>\
         <key>CheckCode</key><string>{}</string>\
         <key>DateTimeOriginal</key><real>40194.46337962963</real>\
         <key>Duration</key><real>31.03</real>\
         <key>FileSize</key><integer>{}</integer>\
         <key>VTList</key><array><string>0:0:0.0:1.5:2.5:3</string><string>1:900:30.03:1.5:2.5:4</string></array>\
         </dict></array><key>XMLFileType</key><string>ModdXML</string></dict></plist>",
        check_code, file_size
    )
}

async fn write_sidecar(dir: &Path, name: &str, check_code: &str, file_size: u64) -> MetadataRecord {
    let path = dir.join(name);
    let text = sidecar_text(check_code, file_size);
    fs::write(&path, &text).await.unwrap();
    ModdDecoder::default().decode(&text, &path).unwrap()
}

#[tokio::test]
async fn test_decode_sidecar_from_disk() {
    let temp_dir = TempDir::new().unwrap();
    let record = write_sidecar(temp_dir.path(), "20100116110730.modd", "5C3B", 100).await;

    assert_eq!(record.display_name, "20100116110730");
    assert_eq!(record.check_code, "5C3B");
    assert_eq!(record.duration_seconds, 31.03);
    assert_eq!(record.file_size_bytes, 100);
    assert_eq!(record.sub_records.len(), 2);
    assert_eq!(record.sub_records[1].as_tuple(), (1, 900, 30.03, 1.5, 2.5, 4));
    assert!(record.actual_timestamp.is_some());
}

#[tokio::test]
async fn test_associate_finds_mp4() {
    let temp_dir = TempDir::new().unwrap();
    let record = write_sidecar(temp_dir.path(), "clip.modd", "1", 1000).await;
    fs::write(temp_dir.path().join("clip.mp4"), vec![7u8; 1000]).await.unwrap();

    let descriptor = VideoAssociator::new()
        .associate(Arc::new(record.clone()))
        .await
        .unwrap();

    assert!(descriptor.matched_path.ends_with("clip.mp4"));
    assert_eq!(descriptor.container_kind, ContainerKind::Mp4);
    assert_eq!(descriptor.size, 1000);
    assert_eq!(descriptor.creation_time, record.actual_timestamp);
    assert_eq!(descriptor.duration_seconds, record.duration_seconds);
    assert!(!descriptor.declared_size_is_stale());
    // default policy hashes the first tenth
    assert_eq!(descriptor.content_hash, modd_core::ContentHash::of(&[7u8; 100]));
}

#[tokio::test]
async fn test_associate_extension_order() {
    let temp_dir = TempDir::new().unwrap();
    let record = write_sidecar(temp_dir.path(), "clip.modd", "1", 10).await;
    fs::write(temp_dir.path().join("clip.mkv"), b"matroska!!").await.unwrap();
    fs::write(temp_dir.path().join("clip.MPG"), b"mpeg-ps!!!").await.unwrap();

    let descriptor = VideoAssociator::new().associate(Arc::new(record)).await.unwrap();
    assert_eq!(descriptor.container_kind, ContainerKind::Mpeg);
    assert_eq!(descriptor.name, "clip.MPG");
}

#[tokio::test]
async fn test_associate_without_video_fails() {
    let temp_dir = TempDir::new().unwrap();
    let record = write_sidecar(temp_dir.path(), "clip.modd", "1", 10).await;
    fs::write(temp_dir.path().join("clip.avi"), b"not tried").await.unwrap();

    let err = VideoAssociator::new().associate(Arc::new(record)).await.unwrap_err();
    assert!(matches!(err, ModdError::VideoNotFound { .. }));
}

#[tokio::test]
async fn test_custom_extension_is_unknown_container() {
    let temp_dir = TempDir::new().unwrap();
    let record = write_sidecar(temp_dir.path(), "clip.modd", "1", 10).await;
    fs::write(temp_dir.path().join("clip.avi"), b"0123456789").await.unwrap();

    let descriptor = VideoAssociator::new()
        .with_extensions(vec![".avi".to_string()])
        .with_hash_policy(HashPolicy::FullFile)
        .associate(Arc::new(record))
        .await
        .unwrap();
    assert_eq!(descriptor.container_kind, ContainerKind::Unknown);
    assert_eq!(descriptor.content_hash, modd_core::ContentHash::of(b"0123456789"));
    assert!(!descriptor.declared_size_is_stale());
}

#[tokio::test]
async fn test_stale_declared_size() {
    let temp_dir = TempDir::new().unwrap();
    let record = write_sidecar(temp_dir.path(), "clip.modd", "1", 999_999).await;
    fs::write(temp_dir.path().join("clip.mp4"), vec![1u8; 50]).await.unwrap();

    let descriptor = VideoAssociator::new().associate(Arc::new(record)).await.unwrap();
    assert!(descriptor.declared_size_is_stale());
}

#[tokio::test]
async fn test_index_last_write_wins_on_identical_prefix() {
    let temp_dir = TempDir::new().unwrap();
    let first = write_sidecar(temp_dir.path(), "first.modd", "A1", 200).await;
    let second = write_sidecar(temp_dir.path(), "second.modd", "B2", 200).await;
    fs::write(temp_dir.path().join("first.mp4"), vec![3u8; 200]).await.unwrap();
    fs::write(temp_dir.path().join("second.mp4"), vec![3u8; 200]).await.unwrap();

    let mut set = RecordSet::with_capacity(2);
    set.insert(first);
    set.insert(second);

    let build = VideoIndex::build(&set, &VideoAssociator::new(), 4).await;
    assert!(build.failures.is_empty());
    assert_eq!(build.index.len(), 1);

    let only = build.index.descriptors().next().unwrap();
    assert_eq!(only.linked_record.check_code, "B2");
    assert_eq!(
        build.index.get(&modd_core::ContentHash::of(&[3u8; 20])).map(|d| d.name.as_str()),
        Some("second.mp4")
    );
}

#[tokio::test]
async fn test_index_collects_failures() {
    let temp_dir = TempDir::new().unwrap();
    let matched = write_sidecar(temp_dir.path(), "matched.modd", "1", 40).await;
    let orphan = write_sidecar(temp_dir.path(), "orphan.modd", "2", 40).await;
    fs::write(temp_dir.path().join("matched.mkv"), vec![9u8; 40]).await.unwrap();

    let set: RecordSet = vec![matched, orphan].into_iter().collect();
    let build = VideoIndex::build(&set, &VideoAssociator::new(), 1).await;

    assert_eq!(build.index.len(), 1);
    assert_eq!(build.failures.len(), 1);
    assert!(build.failures[0].sidecar.ends_with("orphan.modd"));
    assert!(matches!(build.failures[0].error, ModdError::VideoNotFound { .. }));

    let json = serde_json::to_value(&build.index).unwrap();
    let entry = json.as_object().unwrap().values().next().unwrap();
    assert_eq!(entry["container_kind"], "matroska");
    assert_eq!(entry["linked_record"]["check_code"], "1");
}

#[tokio::test]
async fn test_scanner_walks_nested_directories() {
    let temp_dir = TempDir::new().unwrap();
    let nested = temp_dir.path().join("2010").join("01-16");
    fs::create_dir_all(&nested).await.unwrap();

    write_sidecar(temp_dir.path(), "top.modd", "1", 10).await;
    write_sidecar(&nested, "deep.MODD", "2", 10).await;
    fs::write(nested.join("broken.modd"), "Duration,abc\n").await.unwrap();
    fs::write(nested.join("notes.txt"), "ignored").await.unwrap();

    let report = SidecarScanner::default().scan(temp_dir.path()).await.unwrap();

    assert_eq!(report.files_seen, 3);
    assert_eq!(report.records.len(), 2);
    assert_eq!(report.failures.len(), 1);
    assert!(report.failures[0].path.ends_with("broken.modd"));
    assert!(matches!(report.failures[0].error, ModdError::MalformedField { .. }));
}

#[tokio::test]
async fn test_scanner_rejects_missing_root() {
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("nope");
    assert!(SidecarScanner::default().scan(&missing).await.is_err());
}

#[tokio::test]
async fn test_record_json_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let record = write_sidecar(temp_dir.path(), "clip.modd", "00FF", 10).await;

    let json = serde_json::to_string(&record).unwrap();
    let back: MetadataRecord = serde_json::from_str(&json).unwrap();

    assert_eq!(back.display_name, record.display_name);
    assert_eq!(back.source_path, record.source_path);
    assert_eq!(back.check_code, record.check_code);
    assert_eq!(back.actual_timestamp, record.actual_timestamp);
    assert_eq!(back.file_size_bytes, record.file_size_bytes);
    assert_eq!(back.sub_records.len(), record.sub_records.len());
    assert!((back.duration_seconds - record.duration_seconds).abs() < 1e-12);
}

#[tokio::test]
async fn test_hash_short_file_is_io_error() {
    let temp_dir = TempDir::new().unwrap();
    let video = temp_dir.path().join("short.mp4");
    fs::write(&video, vec![5u8; 100]).await.unwrap();

    // declared 10 KiB, so the prefix is 1 KiB but only 100 bytes exist
    let err = VideoAssociator::new()
        .hash_file(&video, 10 * 1024)
        .await
        .unwrap_err();
    match err {
        ModdError::Io { path, source } => {
            assert_eq!(path, video);
            assert_eq!(source.kind(), ErrorKind::UnexpectedEof);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_hash_missing_file_is_io_error() {
    let temp_dir = TempDir::new().unwrap();
    let err = VideoAssociator::new()
        .hash_file(&temp_dir.path().join("gone.mkv"), 10)
        .await
        .unwrap_err();
    assert!(matches!(err, ModdError::Io { ref source, .. } if source.kind() == ErrorKind::NotFound));
}

#[cfg(unix)]
#[tokio::test]
async fn test_hash_stall_times_out() {
    let temp_dir = TempDir::new().unwrap();
    let fifo = temp_dir.path().join("stalled.mp4");
    let status = std::process::Command::new("mkfifo").arg(&fifo).status().unwrap();
    assert!(status.success());

    // opening a FIFO with no writer blocks
    let err = VideoAssociator::new()
        .with_hash_policy(HashPolicy::FullFile)
        .with_read_timeout(Duration::from_millis(200))
        .hash_file(&fifo, 10)
        .await
        .unwrap_err();

    // unblock the pending open so the runtime can shut down
    drop(std::fs::OpenOptions::new().write(true).open(&fifo).unwrap());

    assert!(matches!(err, ModdError::Io { ref source, .. } if source.kind() == ErrorKind::TimedOut));
}

#[tokio::test]
async fn test_hash_spans_many_chunks_within_timeout() {
    let temp_dir = TempDir::new().unwrap();
    let video = temp_dir.path().join("long.mkv");
    let content: Vec<u8> = (0..300_000u32).map(|i| (i % 251) as u8).collect();
    fs::write(&video, &content).await.unwrap();

    // each 64 KiB read gets its own limit; the whole file is several reads
    let hash = VideoAssociator::new()
        .with_hash_policy(HashPolicy::FullFile)
        .with_read_timeout(Duration::from_secs(5))
        .hash_file(&video, content.len() as u64)
        .await
        .unwrap();
    assert_eq!(hash, modd_core::ContentHash::of(&content));
}
