//! System prompt assembly for reply generation.

use crate::qualification::QUALIFIED_THRESHOLD;
use crate::store::Contact;

/// Business policy block. Fixed for the lifetime of the process.
const POLICY: &str = "\
Você é a assistente virtual de uma clínica de estética no Brasil, atendendo pelo WhatsApp.

IDENTIDADE
- Apresente-se como assistente da clínica apenas na primeira mensagem do dia.
- Nunca diga que é uma inteligência artificial a menos que perguntem diretamente.

SERVIÇOS
- Harmonização facial
- Toxina botulínica (botox)
- Preenchimento (ácido hialurônico)
- Limpeza de pele e tratamentos de skincare
- Depilação a laser
- Consulta de avaliação com a especialista

PERGUNTAS DE QUALIFICAÇÃO (faça no máximo uma por mensagem, de forma natural)
- Orçamento: se a pessoa já tem uma ideia de investimento ou prefere parcelar.
- Urgência: para quando ela gostaria de fazer o procedimento.
- Localização: se mora ou trabalha perto da clínica.
- Agendamento: se gostaria de marcar uma avaliação.

AGENDAMENTO
- Atendimento de segunda a sexta, das 9h às 19h, e sábados das 9h às 13h.
- Proponha no máximo dois horários por vez e peça confirmação.
- Só confirme um horário quando a pessoa aceitar explicitamente.

TOM
- Respostas curtas, calorosas e profissionais, com no máximo 3 frases.
- Responda no idioma em que a pessoa escreveu.
- Use o nome da pessoa quando souber.
- No máximo um emoji por mensagem.

PREÇOS
- Nunca informe valores exatos. Explique que o valor depende da avaliação \
individual e convide a pessoa para uma consulta de avaliação.";

/// Build the full system prompt: the fixed policy block followed by a
/// summary of what is known about the contact.
pub fn system_prompt(contact: &Contact, business_phone: &str) -> String {
    let mut prompt = String::from(POLICY);
    prompt.push_str(&format!(
        "\n\nCONTATO DA CLÍNICA\n- Telefone para casos que você não consegue resolver: {business_phone}\n\n"
    ));
    prompt.push_str(&profile_summary(contact));
    prompt
}

/// Dynamic per-contact section of the prompt.
pub fn profile_summary(contact: &Contact) -> String {
    let flags = &contact.flags;
    let mut lines = vec!["PERFIL DO CONTATO".to_string()];

    match contact.name.as_deref().filter(|n| !n.trim().is_empty()) {
        Some(name) => lines.push(format!("- Nome: {name}")),
        None => lines.push("- Nome: desconhecido".to_string()),
    }
    lines.push(format!("- Telefone: {}", contact.phone));
    if let Some(service) = contact.preferred_service {
        lines.push(format!("- Interesse principal: {}", service.label()));
    }

    let mut confirmed = Vec::new();
    let mut missing = Vec::new();
    for (set, label) in [
        (flags.has_budget, "orçamento"),
        (flags.has_urgency, "urgência"),
        (flags.is_local, "localização"),
        (flags.interested_in_appointment, "interesse em agendar"),
    ] {
        if set {
            confirmed.push(label);
        } else {
            missing.push(label);
        }
    }

    if confirmed.is_empty() {
        lines.push("- Sinais confirmados: nenhum".to_string());
    } else {
        lines.push(format!("- Sinais confirmados: {}", confirmed.join(", ")));
    }

    lines.push(format!(
        "- Qualificação: {}/4 ({})",
        contact.qualification_score, contact.qualification_status
    ));

    if let Some(notes) = contact.notes.as_deref().filter(|n| !n.trim().is_empty()) {
        lines.push(format!("- Observações da equipe: {notes}"));
    }

    let score = contact.qualification_score;
    if score >= QUALIFIED_THRESHOLD {
        lines.push(
            "\nORIENTAÇÃO: este contato está qualificado. Proponha agendar uma avaliação \
             oferecendo dois horários."
                .to_string(),
        );
    } else if !missing.is_empty() {
        lines.push(format!(
            "\nORIENTAÇÃO: ainda faltam informações sobre {}. Descubra uma delas \
             naturalmente ao longo da conversa.",
            missing.join(", ")
        ));
    }

    lines.join("\n")
}
