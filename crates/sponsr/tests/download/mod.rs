use sponsr::{
    dash::QualityKey, SponsrError, VideoDownloader, VideoDownloaderConfig, VideoPreference,
};
use wiremock::{
    matchers::{body_json, method, path},
    Mock, MockServer, ResponseTemplate,
};

use crate::common::{
    client, dir_is_empty, init_test_tracing, manifest, mount_manifest, mount_segment, video,
    FakeTools, KEY_HEX, KID_BASE64, LICENSE_K,
};

const VIDEO_ID: &str = "203245765";

async fn mount_tracks(server: &MockServer, sd_expected: u64) {
    mount_segment(server, "/sd/init.mp4", b"[sd-init]", sd_expected).await;
    mount_segment(server, "/sd/1.m4s", b"[sd-1]", sd_expected).await;
    mount_segment(server, "/hd/init.mp4", b"[hd-init]", 1 - sd_expected).await;
    mount_segment(server, "/hd/1.m4s", b"[hd-1]", 1 - sd_expected).await;
    mount_segment(server, "/hd/2.m4s", b"[hd-2]", 1 - sd_expected).await;
    mount_segment(server, "/audio/init.m4a", b"[a-init]", 1).await;
    mount_segment(server, "/audio/1.m4a", b"[a-1]", 1).await;
}

async fn mount_license(server: &MockServer, expected: u64) {
    Mock::given(method("POST"))
        .and(path(format!("/v1/vod/{VIDEO_ID}/acquire/clearkey")))
        .and(body_json(serde_json::json!({
            "kids": [KID_BASE64],
            "type": "temporary",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "keys": [{ "kty": "oct", "kid": KID_BASE64, "k": LICENSE_K }],
            "type": "temporary",
        })))
        .expect(expected)
        .mount(server)
        .await;
}

fn preference(frame: &str) -> VideoPreference {
    VideoPreference {
        frame: frame.parse().unwrap(),
        sound: QualityKey::Best,
    }
}

#[tokio::test]
async fn test_download_selected_resolution() {
    init_test_tracing();
    let server = MockServer::start().await;
    mount_manifest(&server, VIDEO_ID, manifest(&server.uri(), false)).await;
    mount_tracks(&server, 0).await;
    mount_license(&server, 0).await;

    let tools = FakeTools::new();
    let temp_root = tempfile::tempdir().unwrap();
    let output_dir = tempfile::tempdir().unwrap();

    let downloader =
        VideoDownloader::new(video(&server, VIDEO_ID), client(), tools.config(temp_root.path()))
            .unwrap();
    let output = downloader
        .download(&output_dir.path().join("001. Post"), &preference("1920x1080"))
        .await
        .unwrap();

    assert_eq!(output, output_dir.path().join("001. Post.mp4"));
    assert_eq!(
        std::fs::read(&output).unwrap(),
        b"[hd-init][hd-1][hd-2][a-init][a-1]"
    );
    assert_eq!(tools.ffmpeg_calls().len(), 1);
    assert!(tools.mp4decrypt_calls().is_empty());
    assert!(dir_is_empty(temp_root.path()));
}

#[tokio::test]
async fn test_missing_resolution_falls_back_to_best() {
    let server = MockServer::start().await;
    mount_manifest(&server, VIDEO_ID, manifest(&server.uri(), false)).await;
    mount_tracks(&server, 0).await;

    let tools = FakeTools::new();
    let temp_root = tempfile::tempdir().unwrap();
    let output_dir = tempfile::tempdir().unwrap();

    let output = VideoDownloader::new(video(&server, VIDEO_ID), client(), tools.config(temp_root.path()))
        .unwrap()
        .download(&output_dir.path().join("video.mkv"), &preference("9999x9999"))
        .await
        .unwrap();

    assert_eq!(output.extension().unwrap(), "mp4");
    assert!(std::fs::read(&output).unwrap().starts_with(b"[hd-init]"));
}

#[tokio::test]
async fn test_lower_resolution_fetches_only_its_segments() {
    let server = MockServer::start().await;
    mount_manifest(&server, VIDEO_ID, manifest(&server.uri(), false)).await;
    mount_tracks(&server, 1).await;

    let tools = FakeTools::new();
    let temp_root = tempfile::tempdir().unwrap();
    let output_dir = tempfile::tempdir().unwrap();

    let output = VideoDownloader::new(video(&server, VIDEO_ID), client(), tools.config(temp_root.path()))
        .unwrap()
        .download(&output_dir.path().join("video"), &preference("360p"))
        .await
        .unwrap();

    assert_eq!(std::fs::read(&output).unwrap(), b"[sd-init][sd-1][a-init][a-1]");
}

#[tokio::test]
async fn test_protected_content_is_decrypted() {
    init_test_tracing();
    let server = MockServer::start().await;
    mount_manifest(&server, VIDEO_ID, manifest(&server.uri(), true)).await;
    mount_tracks(&server, 0).await;
    mount_license(&server, 1).await;

    let tools = FakeTools::new();
    let temp_root = tempfile::tempdir().unwrap();
    let output_dir = tempfile::tempdir().unwrap();

    let output = VideoDownloader::new(video(&server, VIDEO_ID), client(), tools.config(temp_root.path()))
        .unwrap()
        .download(&output_dir.path().join("video"), &VideoPreference::default())
        .await
        .unwrap();

    let decrypt_calls = tools.mp4decrypt_calls();
    assert_eq!(decrypt_calls.len(), 2);
    for call in &decrypt_calls {
        assert!(call.starts_with(&format!("--key 1:{KEY_HEX} ")));
    }
    assert!(decrypt_calls[0].contains(&format!("video_{VIDEO_ID}.mp4")));
    assert!(decrypt_calls[1].contains(&format!("audio_{VIDEO_ID}.m4a")));

    let ffmpeg_calls = tools.ffmpeg_calls();
    assert_eq!(ffmpeg_calls.len(), 1);
    assert!(ffmpeg_calls[0].contains(&format!("video_{VIDEO_ID}_dec.mp4")));
    assert!(ffmpeg_calls[0].contains(&format!("audio_{VIDEO_ID}_dec.m4a")));

    assert_eq!(
        std::fs::read(&output).unwrap(),
        b"[hd-init][hd-1][hd-2][a-init][a-1]"
    );
    assert!(dir_is_empty(temp_root.path()));
}

#[tokio::test]
async fn test_audio_only_manifest() {
    let server = MockServer::start().await;
    let body = format!(
        r#"<MPD><Period><AdaptationSet mimeType="audio/mp4">
             <Representation audioSamplingRate="48000">
               <BaseURL>{}/audio/</BaseURL>
               <SegmentList><SegmentURL media="init.m4a"/><SegmentURL media="1.m4a"/></SegmentList>
             </Representation>
           </AdaptationSet></Period></MPD>"#,
        server.uri()
    );
    mount_manifest(&server, VIDEO_ID, body).await;
    mount_segment(&server, "/audio/init.m4a", b"[a-init]", 1).await;
    mount_segment(&server, "/audio/1.m4a", b"[a-1]", 1).await;

    let tools = FakeTools::new();
    let temp_root = tempfile::tempdir().unwrap();
    let output_dir = tempfile::tempdir().unwrap();

    let output = VideoDownloader::new(video(&server, VIDEO_ID), client(), tools.config(temp_root.path()))
        .unwrap()
        .download(&output_dir.path().join("podcast"), &VideoPreference::default())
        .await
        .unwrap();

    assert_eq!(std::fs::read(&output).unwrap(), b"[a-init][a-1]");
    let calls = tools.ffmpeg_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].matches("-i ").count(), 1);
}

#[tokio::test]
async fn test_no_segments_found() {
    let server = MockServer::start().await;
    mount_manifest(
        &server,
        VIDEO_ID,
        r#"<MPD><Period><AdaptationSet mimeType="text/vtt"><Representation id="ru"/></AdaptationSet></Period></MPD>"#
            .to_string(),
    )
    .await;

    let tools = FakeTools::new();
    let temp_root = tempfile::tempdir().unwrap();
    let output_dir = tempfile::tempdir().unwrap();

    let result = VideoDownloader::new(video(&server, VIDEO_ID), client(), tools.config(temp_root.path()))
        .unwrap()
        .download(&output_dir.path().join("video"), &VideoPreference::default())
        .await;

    assert!(matches!(result, Err(SponsrError::NoSegmentsFound)));
    assert!(tools.ffmpeg_calls().is_empty());
    assert!(dir_is_empty(temp_root.path()));
}

#[tokio::test]
async fn test_failed_segment_cleans_temp_dir() {
    let server = MockServer::start().await;
    mount_manifest(&server, VIDEO_ID, manifest(&server.uri(), false)).await;
    mount_segment(&server, "/hd/init.mp4", b"[hd-init]", 1).await;
    Mock::given(method("GET"))
        .and(path("/hd/1.m4s"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;
    mount_segment(&server, "/audio/init.m4a", b"[a-init]", 0).await;

    let tools = FakeTools::new();
    let temp_root = tempfile::tempdir().unwrap();
    let output_dir = tempfile::tempdir().unwrap();

    let result = VideoDownloader::new(video(&server, VIDEO_ID), client(), tools.config(temp_root.path()))
        .unwrap()
        .download(&output_dir.path().join("video"), &VideoPreference::default())
        .await;

    assert!(matches!(result, Err(SponsrError::HttpError(_))));
    assert!(dir_is_empty(temp_root.path()));
    assert!(!output_dir.path().join("video.mp4").exists());
}

#[tokio::test]
async fn test_malformed_manifest_is_fatal() {
    let server = MockServer::start().await;
    mount_manifest(&server, VIDEO_ID, "<MPD><Period>".to_string()).await;

    let tools = FakeTools::new();
    let temp_root = tempfile::tempdir().unwrap();

    let result = VideoDownloader::new(video(&server, VIDEO_ID), client(), tools.config(temp_root.path()))
        .unwrap()
        .download(&temp_root.path().join("video"), &VideoPreference::default())
        .await;

    assert!(result.is_err());
    assert!(tools.ffmpeg_calls().is_empty());
    assert!(dir_is_empty(temp_root.path()));
}

#[tokio::test]
async fn test_failing_muxer_reports_output() {
    let server = MockServer::start().await;
    mount_manifest(&server, VIDEO_ID, manifest(&server.uri(), false)).await;
    mount_tracks(&server, 0).await;

    let tools = FakeTools::new();
    let temp_root = tempfile::tempdir().unwrap();
    let config = VideoDownloaderConfig {
        ffmpeg_path: Some("/bin/false".into()),
        ..tools.config(temp_root.path())
    };

    let result = VideoDownloader::new(video(&server, VIDEO_ID), client(), config)
        .unwrap()
        .download(&temp_root.path().join("out/video"), &VideoPreference::default())
        .await;

    match result {
        Err(SponsrError::CommandFailed { status, .. }) => assert!(!status.success()),
        _ => panic!("expected command failure"),
    }
}

#[tokio::test]
async fn test_missing_tool_fails_before_network() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let config = VideoDownloaderConfig {
        ffmpeg_path: Some("/nonexistent/ffmpeg".into()),
        mp4decrypt_path: Some("/nonexistent/mp4decrypt".into()),
        ..Default::default()
    };
    let result = VideoDownloader::new(video(&server, VIDEO_ID), client(), config);

    assert!(matches!(
        result,
        Err(SponsrError::ExecutableNotFound { name: "ffmpeg", .. })
    ));
}

#[tokio::test]
async fn test_list_media_tracks() {
    let server = MockServer::start().await;
    mount_manifest(&server, VIDEO_ID, manifest(&server.uri(), true)).await;

    let tools = FakeTools::new();
    let temp_root = tempfile::tempdir().unwrap();
    let tracks = VideoDownloader::new(video(&server, VIDEO_ID), client(), tools.config(temp_root.path()))
        .unwrap()
        .media_tracks()
        .await
        .unwrap();

    assert_eq!(tracks.resolutions(), ["640x360", "1920x1080"]);
    assert_eq!(tracks.sampling_rates(), ["44100"]);
    assert_eq!(tracks.video()[1].len(), 3);
}
