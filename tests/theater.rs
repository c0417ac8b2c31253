//! Operator and theater authentication, and spoofed-prefix narration.

mod common;

use std::time::Duration;

use common::TestServer;
use limelightd::password::generate_encoded;

fn oper_section() -> String {
    let stored = generate_encoded("wizardry").unwrap();
    format!("[oper.merlin]\npassword = \"{stored}\"\n")
}

fn theater_section() -> String {
    let stored = generate_encoded("curtain").unwrap();
    format!("[theater.\"#stage\"]\npassword = \"{stored}\"\n")
}

#[tokio::test]
async fn oper_authentication() {
    let server = TestServer::spawn_with("", &oper_section())
        .await
        .expect("spawn");
    let mut alice = server.client("alice").await.expect("alice");

    alice.send_raw("OPER merlin wrongpass").await.unwrap();
    assert_eq!(alice.recv().await.unwrap().command, "464");

    alice.send_raw("OPER nobody wizardry").await.unwrap();
    assert_eq!(alice.recv().await.unwrap().command, "464");

    alice.send_raw("OPER merlin wizardry").await.unwrap();
    let replies = alice.recv_until(|m| m.command == "MODE").await.unwrap();
    assert!(replies.iter().any(|m| m.command == "381"));
    assert_eq!(replies.last().unwrap().params, vec!["alice", "+o"]);
}

#[tokio::test]
async fn theater_identify_and_narrate() {
    let server = TestServer::spawn_with("", &theater_section())
        .await
        .expect("spawn");
    let mut narrator = server.client("narrator").await.expect("narrator");
    let mut bob = server.client("bob").await.expect("bob");

    bob.join("#stage").await.unwrap();

    // Narration before IDENTIFY is refused.
    narrator
        .send_raw("THEATER PRIVMSG #stage villain :mwahaha")
        .await
        .unwrap();
    assert_eq!(narrator.recv().await.unwrap().command, "464");

    narrator
        .send_raw("THEATER IDENTIFY #stage wrongpass")
        .await
        .unwrap();
    assert_eq!(narrator.recv().await.unwrap().command, "464");

    narrator
        .send_raw("THEATER IDENTIFY #stage curtain")
        .await
        .unwrap();
    let notice = narrator.recv().await.unwrap();
    assert_eq!(notice.command, "NOTICE");
    assert!(notice.params[1].contains("#stage"));

    narrator
        .send_raw("THEATER PRIVMSG #stage villain :mwahaha")
        .await
        .unwrap();
    let seen = bob.recv_until(|m| m.command == "PRIVMSG").await.unwrap();
    let line = seen.last().unwrap();
    assert_eq!(line.prefix.as_ref().and_then(|p| p.nick()), Some("villain"));
    assert_eq!(line.params, vec!["#stage", "mwahaha"]);

    // ACTION narration wraps in CTCP markers.
    narrator
        .send_raw("THEATER ACTION #stage hero :draws a sword")
        .await
        .unwrap();
    let seen = bob.recv_until(|m| m.command == "PRIVMSG").await.unwrap();
    let line = seen.last().unwrap();
    assert_eq!(line.prefix.as_ref().and_then(|p| p.nick()), Some("hero"));
    assert_eq!(line.params[1], "\u{1}ACTION draws a sword\u{1}");

    // The narrator gets no echo of the spoofed line.
    assert!(narrator
        .recv_timeout(Duration::from_millis(200))
        .await
        .is_err());
}

#[tokio::test]
async fn theater_bans_apply_to_the_real_user() {
    let server = TestServer::spawn_with("", &theater_section())
        .await
        .expect("spawn");
    let mut alice = server.client("alice").await.expect("alice");
    let mut narrator = server.client("narrator").await.expect("narrator");

    alice.join("#stage").await.unwrap();
    alice.send_raw("MODE #stage -n").await.unwrap();
    alice
        .send_raw("MODE #stage +b narrator!*@*")
        .await
        .unwrap();
    alice.drain().await;

    narrator
        .send_raw("THEATER IDENTIFY #stage curtain")
        .await
        .unwrap();
    narrator.recv().await.unwrap();

    // The grant does not override the ban on the real client.
    narrator
        .send_raw("THEATER PRIVMSG #stage villain :mwahaha")
        .await
        .unwrap();
    assert_eq!(narrator.recv().await.unwrap().command, "404");
    assert!(alice
        .recv_timeout(Duration::from_millis(200))
        .await
        .is_err());
}
