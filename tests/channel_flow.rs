//! Channel flows: join and broadcast semantics, part, kick, topic, and
//! nick renames.

mod common;

use std::time::Duration;

use common::TestServer;

#[tokio::test]
async fn join_names_and_privmsg_fanout() {
    let server = TestServer::spawn().await.expect("spawn");
    let mut alice = server.client("alice").await.expect("alice");
    let mut bob = server.client("bob").await.expect("bob");

    // The creator sees her own JOIN, then 353 with herself as op, then 366.
    let burst = alice.join("#room").await.unwrap();
    assert!(burst
        .iter()
        .any(|m| m.command == "JOIN" && m.params[0] == "#room"));
    let names = burst.iter().find(|m| m.command == "353").unwrap();
    assert!(names.params.last().unwrap().contains("@alice"));

    bob.join("#room").await.unwrap();

    // Alice sees bob's join with his full prefix.
    let seen = alice
        .recv_until(|m| m.command == "JOIN")
        .await
        .unwrap();
    let join = seen.last().unwrap();
    assert_eq!(join.prefix.as_ref().and_then(|p| p.nick()), Some("bob"));

    alice.privmsg("#room", "hello bob").await.unwrap();
    let received = bob
        .recv_until(|m| m.command == "PRIVMSG")
        .await
        .unwrap();
    let msg = received.last().unwrap();
    assert_eq!(msg.params, vec!["#room", "hello bob"]);
    assert_eq!(msg.prefix.as_ref().and_then(|p| p.nick()), Some("alice"));

    // The sender gets no echo.
    assert!(alice
        .recv_timeout(Duration::from_millis(200))
        .await
        .is_err());
}

#[tokio::test]
async fn part_is_broadcast_and_empty_channels_die() {
    let server = TestServer::spawn().await.expect("spawn");
    let mut alice = server.client("alice").await.expect("alice");
    let mut bob = server.client("bob").await.expect("bob");

    alice.join("#room").await.unwrap();
    bob.join("#room").await.unwrap();
    alice.drain().await;

    bob.send_raw("PART #room :goodbye").await.unwrap();
    let seen = alice.recv_until(|m| m.command == "PART").await.unwrap();
    let part = seen.last().unwrap();
    assert_eq!(part.params, vec!["#room", "goodbye"]);

    // Last member out destroys the channel: a fresh join recreates it
    // with creator ops.
    alice.send_raw("PART #room").await.unwrap();
    alice.recv_until(|m| m.command == "PART").await.unwrap();
    let burst = bob.join("#room").await.unwrap();
    let names = burst.iter().find(|m| m.command == "353").unwrap();
    assert!(names.params.last().unwrap().contains("@bob"));
}

#[tokio::test]
async fn quit_reaches_channel_peers() {
    let server = TestServer::spawn().await.expect("spawn");
    let mut alice = server.client("alice").await.expect("alice");
    let mut bob = server.client("bob").await.expect("bob");

    alice.join("#room").await.unwrap();
    bob.join("#room").await.unwrap();
    alice.drain().await;

    bob.quit("gone home").await.unwrap();
    let seen = alice.recv_until(|m| m.command == "QUIT").await.unwrap();
    let quit = seen.last().unwrap();
    assert_eq!(quit.prefix.as_ref().and_then(|p| p.nick()), Some("bob"));
    assert_eq!(quit.params[0], "gone home");
}

#[tokio::test]
async fn kick_requires_ops_and_removes_member() {
    let server = TestServer::spawn().await.expect("spawn");
    let mut alice = server.client("alice").await.expect("alice");
    let mut bob = server.client("bob").await.expect("bob");

    alice.join("#room").await.unwrap();
    bob.join("#room").await.unwrap();
    alice.drain().await;

    // Bob is not an operator.
    bob.send_raw("KICK #room alice :no").await.unwrap();
    let reply = bob.recv().await.unwrap();
    assert_eq!(reply.command, "482");

    // Alice is.
    alice.send_raw("KICK #room bob :misbehaving").await.unwrap();
    let seen = bob.recv_until(|m| m.command == "KICK").await.unwrap();
    let kick = seen.last().unwrap();
    assert_eq!(kick.params, vec!["#room", "bob", "misbehaving"]);

    // Bob is really gone: speaking from outside hits +n rules only if set,
    // so check membership via KICK from alice again.
    alice.drain().await;
    alice.send_raw("KICK #room bob").await.unwrap();
    let reply = alice.recv().await.unwrap();
    assert_eq!(reply.command, "441");
}

#[tokio::test]
async fn topic_set_and_replay() {
    let server = TestServer::spawn().await.expect("spawn");
    let mut alice = server.client("alice").await.expect("alice");
    let mut bob = server.client("bob").await.expect("bob");

    alice.join("#room").await.unwrap();
    // A fresh channel reports no topic on join.
    let burst = bob.join("#room").await.unwrap();
    assert!(burst.iter().any(|m| m.command == "331"));
    alice.drain().await;

    alice.send_raw("TOPIC #room :tonight: the play").await.unwrap();
    let seen = bob.recv_until(|m| m.command == "TOPIC").await.unwrap();
    assert_eq!(seen.last().unwrap().params, vec!["#room", "tonight: the play"]);

    // Late joiners get 332 with the text.
    let mut carol = server.client("carol").await.expect("carol");
    let burst = carol.join("#room").await.unwrap();
    let topic = burst.iter().find(|m| m.command == "332").unwrap();
    assert_eq!(topic.params[2], "tonight: the play");
}

#[tokio::test]
async fn nick_rename_is_broadcast() {
    let server = TestServer::spawn().await.expect("spawn");
    let mut alice = server.client("alice").await.expect("alice");
    let mut bob = server.client("bob").await.expect("bob");

    alice.join("#room").await.unwrap();
    bob.join("#room").await.unwrap();
    alice.drain().await;
    bob.drain().await;

    bob.send_raw("NICK robert").await.unwrap();
    let seen = alice.recv_until(|m| m.command == "NICK").await.unwrap();
    let change = seen.last().unwrap();
    assert_eq!(change.prefix.as_ref().and_then(|p| p.nick()), Some("bob"));
    assert_eq!(change.params[0], "robert");

    // The old nick is free again, the new one is taken.
    let mut carol = server.client("carol").await.expect("carol");
    carol.send_raw("NICK robert").await.unwrap();
    assert_eq!(carol.recv().await.unwrap().command, "433");
    carol.send_raw("NICK bob").await.unwrap();
    let change = carol.recv_until(|m| m.command == "NICK").await.unwrap();
    assert_eq!(change.last().unwrap().params[0], "bob");
}
