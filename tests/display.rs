use stagehand::{Screen, Stage, TestScreen, View};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn echo_screen() -> Screen {
    Screen::new(|ctx| async move {
        let query = ctx
            .params()
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join("&");
        Ok(View::text(format!("params:{query}")))
    })
}

#[tokio::test]
async fn it_displays_registered_screen() {
    init_tracing();
    let stage = Stage::spawn("echo", echo_screen()).await.unwrap();

    let mut screen = TestScreen::named(&stage, "front");
    let response = screen
        .register("echo")
        .unwrap()
        .display()
        .await
        .unwrap();

    assert!(response.status().is_success());
    assert_eq!(response.text().await.unwrap(), "params:");

    stage.shutdown().await;
}

#[tokio::test]
async fn it_builds_url_from_stored_parameters() {
    let stage = Stage::spawn("echo", echo_screen()).await.unwrap();

    let mut screen = TestScreen::named(&stage, "front");
    let response = screen
        .register("echo")
        .unwrap()
        .parameters([("a", "1"), ("b", "2")])
        .display()
        .await
        .unwrap();

    assert_eq!(response.text().await.unwrap(), "params:a=1&b=2");

    stage.shutdown().await;
}

#[tokio::test]
async fn it_replaces_parameters_instead_of_merging() {
    let stage = Stage::spawn("echo", echo_screen()).await.unwrap();

    let mut screen = TestScreen::named(&stage, "front");
    screen
        .register("echo")
        .unwrap()
        .parameters([("a", "1"), ("b", "2")]);
    screen.parameters([("c", "3")]);

    let response = screen.display().await.unwrap();

    assert_eq!(response.text().await.unwrap(), "params:c=3");

    stage.shutdown().await;
}

#[tokio::test]
async fn it_registers_route_at_custom_segment() {
    let stage = Stage::spawn("echo", echo_screen()).await.unwrap();

    let mut screen = TestScreen::named(&stage, "front");
    let response = screen
        .register_at("echo", "somewhere-else")
        .unwrap()
        .display()
        .await
        .unwrap();

    assert!(response.status().is_success());
    assert_eq!(response.url().path(), "/_test/somewhere-else");

    stage.shutdown().await;
}

#[tokio::test]
async fn it_sends_extra_display_headers() {
    let stage = Stage::spawn(
        "headers",
        Screen::new(|ctx| async move {
            let tag = ctx.header("x-tag").unwrap_or("-").to_owned();
            Ok(View::text(format!("tag:{tag}")))
        }),
    )
    .await
    .unwrap();

    let mut screen = TestScreen::named(&stage, "front");
    screen.register("headers").unwrap();

    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert("x-tag", reqwest::header::HeaderValue::from_static("per-request"));
    let response = screen.display_with(headers).await.unwrap();

    assert_eq!(response.text().await.unwrap(), "tag:per-request");

    stage.shutdown().await;
}

#[tokio::test]
async fn it_propagates_route_not_found_for_unregistered_name() {
    let stage = Stage::spawn("echo", echo_screen()).await.unwrap();

    let screen = TestScreen::named(&stage, "ghost");
    let err = screen.display().await.unwrap_err();

    assert_eq!(err.status.as_u16(), 404);

    stage.shutdown().await;
}

#[tokio::test]
async fn it_propagates_unresolvable_screen_at_registration() {
    let stage = Stage::spawn("echo", echo_screen()).await.unwrap();

    let mut screen = TestScreen::named(&stage, "front");
    let err = screen.register("ghost").unwrap_err();

    assert_eq!(err.status.as_u16(), 404);

    stage.shutdown().await;
}

#[tokio::test]
async fn it_generates_distinct_names_per_instance() {
    let stage = Stage::spawn("echo", echo_screen()).await.unwrap();

    let one = TestScreen::new(&stage);
    let two = TestScreen::new(&stage);

    assert_ne!(one.name(), two.name());

    stage.shutdown().await;
}
