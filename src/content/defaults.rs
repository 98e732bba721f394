//! Built-in booth deck, used when no slide file exists yet

use super::slide::{Slide, SlideId};

const DEFAULT_DECK: &[(SlideId, &str, &str)] = &[
    (
        1,
        "BumbleB - Das automatisierte Shuttle",
        "Schonmal ein automatisiert Shuttle gesehen, das aussieht wie eine Hummel?\n\nShuttle fährt los von Bushaltestelle an Bahnhof...",
    ),
    (
        2,
        "BumbleB - Wie die Hummel fährt",
        "Wie die Hummel ihre Flügel nutzt, so nutzt unser BumbleB innovative Technologie für autonomes Fahren.",
    ),
    (
        3,
        "Einsatzgebiete und Vorteile",
        "Vielseitige Einsatzmöglichkeiten in urbanen Gebieten für nachhaltigen Transport.",
    ),
    (
        4,
        "Sicherheitssysteme",
        "Moderne Sicherheitssysteme gewährleisten maximale Sicherheit für alle Passagiere.",
    ),
    (
        5,
        "Nachhaltigkeit & Umwelt",
        "Nachhaltiger Transport für eine grüne Zukunft - umweltfreundlich und effizient.",
    ),
];

pub fn default_deck() -> Vec<Slide> {
    DEFAULT_DECK
        .iter()
        .map(|(id, title, body)| Slide::new(*id, title, body))
        .collect()
}
