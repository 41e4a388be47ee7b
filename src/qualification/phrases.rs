//! Trigger phrase lists for qualification inference.
//!
//! Lists are lowercase and matched as case-insensitive substrings. Phrases
//! in one list must not contain a phrase from another list, otherwise a
//! single trigger would set two criteria at once.

use super::ServiceCategory;

/// Contact is asking about price or payment, i.e. has a budget in mind.
pub const BUDGET: &[&str] = &[
    "quanto custa",
    "qual o valor",
    "qual o preço",
    "preço",
    "valor",
    "orçamento",
    "parcelar",
    "parcela",
    "cartão",
    "pix",
    "à vista",
    "how much",
    "price",
    "cost",
    "budget",
    "payment",
    "afford",
];

/// Contact wants the service soon.
pub const URGENCY: &[&str] = &[
    "urgente",
    "urgência",
    "hoje",
    "amanhã",
    "o quanto antes",
    "essa semana",
    "esta semana",
    "logo",
    "rápido",
    "asap",
    "urgent",
    "today",
    "tomorrow",
    "this week",
    "as soon as possible",
];

/// Contact lives or works near the clinic.
pub const LOCALITY: &[&str] = &[
    "moro perto",
    "moro em",
    "moro na",
    "moro no",
    "sou daqui",
    "aqui perto",
    "perto da clínica",
    "bairro",
    "mesma cidade",
    "local",
    "i live nearby",
    "live near",
    "nearby",
    "close by",
    "near you",
];

/// Contact wants to book a visit.
pub const APPOINTMENT: &[&str] = &[
    "agendar",
    "agendamento",
    "marcar",
    "horário",
    "horario",
    "disponibilidade",
    "quero ir",
    "appointment",
    "schedule",
    "book",
    "booking",
];

const HARMONIZATION: &[&str] = &[
    "harmonização",
    "harmonizacao",
    "harmonizar",
    "harmonization",
];

const BOTOX: &[&str] = &["botox", "toxina botulínica", "toxina", "rugas", "wrinkle"];

const FILLER: &[&str] = &[
    "preenchimento",
    "ácido hialurônico",
    "acido hialuronico",
    "lábios",
    "labios",
    "filler",
    "lips",
];

const SKIN_CARE: &[&str] = &[
    "limpeza de pele",
    "peeling",
    "skincare",
    "skin care",
    "acne",
    "manchas",
];

const LASER_HAIR_REMOVAL: &[&str] = &["depilação", "depilacao", "laser", "hair removal"];

const CONSULTATION: &[&str] = &[
    "consulta",
    "avaliação",
    "avaliacao",
    "consultation",
    "evaluation",
];

/// Phrase lists per service category, in detection priority order.
pub const SERVICES: &[(ServiceCategory, &[&str])] = &[
    (ServiceCategory::Harmonization, HARMONIZATION),
    (ServiceCategory::Botox, BOTOX),
    (ServiceCategory::Filler, FILLER),
    (ServiceCategory::SkinCare, SKIN_CARE),
    (ServiceCategory::LaserHairRemoval, LASER_HAIR_REMOVAL),
    (ServiceCategory::Consultation, CONSULTATION),
];
