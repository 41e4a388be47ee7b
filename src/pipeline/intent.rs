//! Appointment-confirmation detection in generated replies.
//!
//! A reply that confirms a booking is treated as evidence that the contact
//! wants an appointment. This is a heuristic on the assistant's own text.

use std::sync::LazyLock;

use crate::qualification::engine::PhraseMatcher;

/// Phrases the assistant uses when confirming a booking.
pub const CONFIRMATION_PHRASES: &[&str] = &[
    "agendamento confirmado",
    "consulta agendada",
    "avaliação agendada",
    "agendado para",
    "agendada para",
    "horário reservado",
    "horário confirmado",
    "te espero",
    "aguardamos você",
    "appointment confirmed",
    "you're booked",
    "you are booked",
    "booked for",
    "see you on",
];

static CONFIRMATION: LazyLock<PhraseMatcher> =
    LazyLock::new(|| PhraseMatcher::new(CONFIRMATION_PHRASES));

/// True when the reply text reads as a booking confirmation.
pub fn confirms_appointment(reply: &str) -> bool {
    CONFIRMATION.is_match(reply)
}
