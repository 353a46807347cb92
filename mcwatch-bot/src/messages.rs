//! Reply texts for the chat commands.

use mcwatch_core::{LedgerEntry, PlayerName, Snapshot, format_playtime};

pub const VERIFY_INSTRUCTIONS: &str = "In order to verify your account:
1. Make sure you are disconnected
2. Press the thumbs up!
3. Log onto the server and wait a few seconds
4. Log off again";

pub const SERVER_OFFLINE: &str = "The server is offline. :sob:";

pub fn online(snapshot: &Snapshot) -> String {
    let Some(status) = snapshot.status() else {
        return SERVER_OFFLINE.to_string();
    };
    if status.online == 0 {
        return "No one is currently online. :cry:".to_string();
    }

    let header = if status.online == 1 {
        "1 person is currently online".to_string()
    } else {
        format!("{} people are currently online", status.online)
    };
    // Servers may hide the sample, or list only part of a large crowd.
    let names: Vec<&str> = status.player_names().collect();
    if names.is_empty() {
        format!("{header}.")
    } else {
        format!("{header}:\n> {}", names.join("\n> "))
    }
}

pub fn shame(top: Option<(PlayerName, LedgerEntry)>) -> String {
    let Some((name, entry)) = top else {
        return "No one has played yet. How wholesome.".to_string();
    };
    let hours = entry.minutes / 60;
    if entry.linked_identity_id.is_empty() {
        format!(
            "{name} has played for {hours} hours, and hasn't verified their account! Even more shameful!"
        )
    } else {
        format!(
            "<@{}> has played for {hours} hours! Shameful!",
            entry.linked_identity_id
        )
    }
}

pub fn own_playtime(entry: Option<&LedgerEntry>, prefix: &str) -> String {
    match entry {
        Some(entry) => format!("You have played for {}!", format_playtime(entry.minutes)),
        None => format!("Please verify your account! ({prefix}verify username)"),
    }
}

pub fn playtime_of(query: &str, entry: Option<&LedgerEntry>) -> String {
    match entry {
        Some(entry) => format!("{query} has played for {}!", format_playtime(entry.minutes)),
        None => format!("{query} doesn't exist, or needs to verify their account!"),
    }
}

pub fn whois(query: &str, player: Option<PlayerName>) -> String {
    match player {
        Some(player) => format!("{query} is {player}"),
        None => "I don't know :pleading_face:".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcwatch_core::{SampledPlayer, ServerStatus};

    fn snapshot(online: u32, names: &[&str]) -> Snapshot {
        Snapshot::Reachable(ServerStatus::new(
            online,
            20,
            names.iter().map(|name| SampledPlayer {
                name: name.to_string(),
                id: String::new(),
            }),
        ))
    }

    fn entry(minutes: u64, linked_id: &str) -> LedgerEntry {
        LedgerEntry {
            minutes,
            id: "uuid".to_string(),
            linked_identity_name: if linked_id.is_empty() {
                String::new()
            } else {
                "someone".to_string()
            },
            linked_identity_id: linked_id.to_string(),
        }
    }

    #[test]
    fn test_online_messages() {
        assert_eq!(online(&Snapshot::Unreachable), SERVER_OFFLINE);
        assert_eq!(online(&snapshot(0, &[])), "No one is currently online. :cry:");
        assert_eq!(online(&snapshot(1, &["Steve"])), "1 person is currently online:\n> Steve");
        assert_eq!(
            online(&snapshot(2, &["Steve", "Alex"])),
            "2 people are currently online:\n> Steve\n> Alex"
        );
        assert_eq!(online(&snapshot(40, &[])), "40 people are currently online.");
    }

    #[test]
    fn test_shame_messages() {
        let name = "Steve".to_string();
        assert_eq!(
            shame(Some((name.clone(), entry(185, "1234")))),
            "<@1234> has played for 3 hours! Shameful!"
        );
        assert_eq!(
            shame(Some((name, entry(59, "")))),
            "Steve has played for 0 hours, and hasn't verified their account! Even more shameful!"
        );
        assert!(shame(None).starts_with("No one has played yet"));
    }

    #[test]
    fn test_playtime_messages() {
        assert_eq!(
            own_playtime(Some(&entry(30, "1")), "$"),
            "You have played for 30 minutes!"
        );
        assert_eq!(
            own_playtime(None, "$"),
            "Please verify your account! ($verify username)"
        );
        assert_eq!(
            playtime_of("<@!1>", Some(&entry(125, "1"))),
            "<@!1> has played for 2 hours!"
        );
        assert_eq!(
            playtime_of("bob", None),
            "bob doesn't exist, or needs to verify their account!"
        );
    }

    #[test]
    fn test_whois_messages() {
        let name = "jeb_".to_string();
        assert_eq!(whois("jeb", Some(name)), "jeb is jeb_");
        assert_eq!(whois("jeb", None), "I don't know :pleading_face:");
    }
}
