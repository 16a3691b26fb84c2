use std::time::Duration;

use anyhow::Error;
use test_utils::router::{
    connected_client,
    create_client,
};
use wamp_client::{
    core::{
        close::CloseReason,
        error::{
            InteractionError,
            PeerError,
        },
        id::Id,
        types::{
            Dictionary,
            List,
            Value,
        },
        uri::Uri,
    },
    message::message::{
        AbortMessage,
        CallMessage,
        GoodbyeMessage,
        Message,
        ResultMessage,
        WelcomeMessage,
    },
    peer::{
        Client,
        Session,
        SessionConfig,
        SessionState,
    },
    serializer::json::JsonSerializer,
    transport::direct_transport::direct_transport,
};

fn goodbye(reason: CloseReason) -> Message {
    Message::Goodbye(GoodbyeMessage {
        details: Dictionary::default(),
        reason: reason.uri(),
    })
}

#[tokio::test]
async fn joins_realm_when_router_welcomes_session() {
    test_utils::setup::setup_test_environment();

    let (client, mut router) = create_client(SessionConfig {
        agent: "test-agent".to_owned(),
        ..Default::default()
    })
    .unwrap();
    let session = client.session().clone();
    let connect = tokio::spawn(async move { session.connect().await });

    pretty_assertions::assert_eq!(
        router.next_text().await,
        Some(r#"[1,"realm1",{"agent":"test-agent","roles":{"publisher":{},"subscriber":{},"caller":{},"callee":{}}}]"#.to_owned())
    );
    router
        .send(Message::Welcome(WelcomeMessage {
            session: Id::from(314),
            details: Dictionary::default(),
        }))
        .unwrap();

    assert_matches::assert_matches!(connect.await, Ok(Ok(welcome)) => {
        assert_eq!(welcome.session, Id::from(314));
    });
    assert_eq!(client.session().state().await, SessionState::Established);
    assert_eq!(client.session().session_id().await, Some(Id::from(314)));
}

#[tokio::test]
async fn fails_to_connect_when_router_aborts() {
    test_utils::setup::setup_test_environment();

    let (client, mut router) = create_client(SessionConfig::default()).unwrap();
    let session = client.session().clone();
    let connect = tokio::spawn(async move { session.connect().await });

    assert_matches::assert_matches!(router.recv().await, Ok(Message::Hello(_)));
    router
        .send(Message::Abort(AbortMessage {
            details: Dictionary::default(),
            reason: InteractionError::NoSuchRealm.uri(),
        }))
        .unwrap();

    assert_matches::assert_matches!(connect.await, Ok(Err(err)) => {
        assert_matches::assert_matches!(&err, PeerError::Aborted(abort) => {
            assert_eq!(abort.reason.as_str(), "wamp.error.no_such_realm");
        });
        assert_eq!(err.router_error(), Some(InteractionError::NoSuchRealm));
        assert!(!err.is_retryable());
    });
    assert_eq!(client.session().state().await, SessionState::Closed);
}

#[tokio::test]
async fn aborts_when_router_replies_with_unexpected_message() {
    test_utils::setup::setup_test_environment();

    let (client, mut router) = create_client(SessionConfig::default()).unwrap();
    let session = client.session().clone();
    let connect = tokio::spawn(async move { session.connect().await });

    assert_matches::assert_matches!(router.recv().await, Ok(Message::Hello(_)));
    router
        .send(Message::Result(ResultMessage {
            call_request: Id::from(1),
            details: Dictionary::default(),
            yield_arguments: None,
            yield_arguments_keyword: None,
        }))
        .unwrap();

    assert_matches::assert_matches!(
        connect.await,
        Ok(Err(PeerError::Interaction(InteractionError::ProtocolViolation(_))))
    );
    assert_matches::assert_matches!(router.recv().await, Ok(Message::Abort(abort)) => {
        assert_eq!(abort.reason.as_str(), "wamp.error.protocol_violation");
    });
    assert_eq!(client.session().state().await, SessionState::Closed);
}

#[tokio::test]
async fn fails_to_connect_when_transport_fails() {
    test_utils::setup::setup_test_environment();

    let (transport, remote) = direct_transport();
    let session = Session::new(
        SessionConfig::default(),
        Box::new(transport),
        Box::new(JsonSerializer::default()),
    )
    .unwrap();
    remote.fail(Error::msg("connection refused")).unwrap();

    assert_matches::assert_matches!(session.connect().await, Err(err) => {
        assert_matches::assert_matches!(
            &err,
            PeerError::Interaction(InteractionError::NetworkFailure(_))
        );
        assert!(err.is_retryable());
    });
    assert_eq!(session.state().await, SessionState::Closed);
}

#[tokio::test]
async fn cannot_connect_twice() {
    test_utils::setup::setup_test_environment();

    let (client, _router) = connected_client().await.unwrap();
    assert_matches::assert_matches!(client.say_hello().await, Err(PeerError::NotValid(_)));
}

#[tokio::test]
async fn says_goodbye_and_waits_for_acknowledgement() {
    test_utils::setup::setup_test_environment();

    let (client, mut router) = connected_client().await.unwrap();

    let session = client.session().clone();
    let goodbye_result =
        tokio::spawn(async move { session.say_goodbye(CloseReason::SystemShutdown).await });

    assert_matches::assert_matches!(router.recv().await, Ok(Message::Goodbye(goodbye)) => {
        assert_eq!(goodbye.reason.as_str(), "wamp.close.system_shutdown");
    });
    router.send(goodbye(CloseReason::GoodbyeAndOut)).unwrap();

    assert_matches::assert_matches!(goodbye_result.await, Ok(Ok(goodbye)) => {
        assert_eq!(goodbye.reason.as_str(), "wamp.close.goodbye_and_out");
    });
    assert_eq!(client.session().state().await, SessionState::Closed);

    // The acknowledgement is not answered.
    assert_matches::assert_matches!(router.try_recv(Duration::from_millis(50)).await, None);
}

#[tokio::test]
async fn accepts_normal_close_reason_as_acknowledgement() {
    test_utils::setup::setup_test_environment();

    let (client, mut router) = connected_client().await.unwrap();

    let goodbye_result = tokio::spawn({
        let session = client.session().clone();
        async move { session.say_goodbye(CloseReason::Normal).await }
    });
    assert_matches::assert_matches!(router.recv().await, Ok(Message::Goodbye(_)));
    router.send(goodbye(CloseReason::Normal)).unwrap();

    assert_matches::assert_matches!(goodbye_result.await, Ok(Ok(goodbye)) => {
        assert_eq!(goodbye.reason.as_str(), "wamp.close.normal");
    });
    assert_eq!(client.session().state().await, SessionState::Closed);
}

#[tokio::test]
async fn say_goodbye_fails_when_router_closes_with_other_reason() {
    test_utils::setup::setup_test_environment();

    let (client, mut router) = connected_client().await.unwrap();

    let goodbye_result = tokio::spawn({
        let session = client.session().clone();
        async move { session.say_goodbye(CloseReason::SystemShutdown).await }
    });
    assert_matches::assert_matches!(router.recv().await, Ok(Message::Goodbye(_)));
    router.send(goodbye(CloseReason::Killed)).unwrap();

    // The router's GOODBYE is answered, but it does not acknowledge ours.
    assert_matches::assert_matches!(router.recv().await, Ok(Message::Goodbye(reply)) => {
        assert_eq!(reply.reason.as_str(), "wamp.close.goodbye_and_out");
    });
    assert_matches::assert_matches!(goodbye_result.await, Ok(Err(PeerError::Closed(goodbye))) => {
        assert_eq!(goodbye.reason.as_str(), "wamp.close.killed");
    });
    assert_eq!(client.session().state().await, SessionState::Closed);
}

#[tokio::test]
async fn replies_to_unsolicited_goodbye() {
    test_utils::setup::setup_test_environment();

    let (client, mut router) = connected_client().await.unwrap();

    router.send(goodbye(CloseReason::CloseRealm)).unwrap();
    assert_matches::assert_matches!(router.recv().await, Ok(Message::Goodbye(goodbye)) => {
        assert_eq!(goodbye.reason.as_str(), "wamp.close.goodbye_and_out");
    });
    assert_eq!(client.session().state().await, SessionState::Closed);
    assert_matches::assert_matches!(
        client
            .caller()
            .unwrap()
            .call(Uri::try_from("com.myapp.add2").unwrap(), None, None)
            .await,
        Err(PeerError::NotValid(_))
    );
}

#[tokio::test]
async fn drops_frames_that_fail_to_decode() {
    test_utils::setup::setup_test_environment();

    let (client, mut router) = connected_client().await.unwrap();

    let call = tokio::spawn({
        let session = client.session().clone();
        async move {
            session
                .request(
                    Message::Call(CallMessage {
                        request: Id::from(77),
                        options: Dictionary::default(),
                        procedure: Uri::try_from("com.myapp.echo").unwrap(),
                        arguments: Some(List::from_iter([Value::from("hi")])),
                        arguments_keyword: None,
                    }),
                    |message| match message {
                        Message::Result(message) if message.call_request == Id::from(77) => {
                            Some(Ok(message))
                        }
                        _ => None,
                    },
                )
                .await
        }
    });
    assert_matches::assert_matches!(router.recv().await, Ok(Message::Call(_)));

    router.send_text("not json").unwrap();
    router.send_text("[999,1]").unwrap();
    router.send_text(r#"{"tag":50}"#).unwrap();
    router.send_text(r#"[50,77,{},["hi"]]"#).unwrap();

    assert_matches::assert_matches!(call.await, Ok(Ok(result)) => {
        pretty_assertions::assert_eq!(
            result.yield_arguments,
            Some(List::from_iter([Value::from("hi")]))
        );
    });
    assert_eq!(client.session().state().await, SessionState::Established);
}

#[tokio::test]
async fn pending_requests_fail_when_transport_disconnects() {
    test_utils::setup::setup_test_environment();

    let (client, mut router) = connected_client().await.unwrap();

    let session = client.session().clone();
    let call = tokio::spawn(async move {
        let client = Client::new(session);
        client
            .caller()
            .unwrap()
            .call(Uri::try_from("com.myapp.slow").unwrap(), None, None)
            .await
    });
    assert_matches::assert_matches!(router.recv().await, Ok(Message::Call(_)));
    router.disconnect();

    assert_matches::assert_matches!(call.await, Ok(Err(PeerError::NotValid(_))));
    assert_eq!(client.session().state().await, SessionState::Closed);
}

#[tokio::test]
async fn pending_requests_fail_when_session_is_cancelled() {
    test_utils::setup::setup_test_environment();

    let (client, mut router) = connected_client().await.unwrap();

    let session = client.session().clone();
    let call = tokio::spawn(async move {
        let client = Client::new(session);
        client
            .caller()
            .unwrap()
            .call(Uri::try_from("com.myapp.slow").unwrap(), None, None)
            .await
    });
    assert_matches::assert_matches!(router.recv().await, Ok(Message::Call(_)));
    client.session().cancel().await;

    assert_matches::assert_matches!(call.await, Ok(Err(PeerError::NotValid(_))));
    // No further messages are sent, and the transport is closed.
    assert_matches::assert_matches!(router.next_text().await, None);
}
