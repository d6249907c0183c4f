use crate::{Document, DocumentId, PresetPrompt, Section, SectionTopic, Sections};

pub const BUILTIN_IDS: [&str; 2] = ["sphinx", "echo-pediatrie"];

pub fn is_builtin_id(id: &DocumentId) -> bool {
    BUILTIN_IDS.contains(&id.as_str())
}

fn section(title: &str, display_content: &str, raw_text: &str) -> Section {
    Section {
        title: title.to_string(),
        display_content: display_content.to_string(),
        raw_text: raw_text.to_string(),
    }
}

/// Reference documents shipped with the binary, in catalog order.
pub fn builtin_documents() -> Vec<Document> {
    vec![sphinx(), echo_pediatrie()]
}

fn sphinx() -> Document {
    Document {
        id: DocumentId::new("sphinx"),
        title: "Audit Stratégique Sphinx".to_string(),
        subtitle: "Cabinet SPHINX Consulting".to_string(),
        sections: Sections {
            forces: section(
                "Analyse de l'Identité & Forces",
                "Le document SPHINX présente un cabinet pluridisciplinaire spécialisé dans \
                 l'accompagnement stratégique des institutions publiques au Cameroun.",
                "SPHINX Consulting, cabinet de conseil stratégique santé publique Cameroun. \
                 Vision: Amélioration systèmes sociaux. Mission: Appui décideurs projets fort \
                 impact. Forfaits 3-9M FCFA.",
            ),
            faiblesses: section(
                "Domaines & Évaluation des Risques",
                "Le cabinet cible la santé publique et l'économie appliquée mais fait face à \
                 une concurrence locale forte.",
                "Domaines: Santé publique, Économie santé, Gestion projets. Risques: Dépendance \
                 consultants externes, concurrence locale forte, taux de survie cabinets 40%.",
            ),
            propositions: section(
                "Propositions & Grille Tarifaire",
                "Grille tarifaire flexible entre 1.8M et 6M FCFA pour les études stratégiques.",
                "Matrice activités: Contrats consulting ONG, Ministères. Grille: 1.8M-9M FCFA \
                 selon études. Opportunité majeure: Couverture Santé Universelle (CSU).",
            ),
        },
        full_reference: SPHINX_REFERENCE.to_string(),
        presets: vec![PresetPrompt {
            topic: SectionTopic::Propositions,
            label: "Stratégie CSU Expert".to_string(),
            prompt: "Élabore spécifiquement sur les opportunités liées aux appels d'offres CSU \
                     pour SPHINX Consulting au Cameroun. Propose des stratégies d'approche \
                     concrètes (lobbying, expertise technique, partenariats)."
                .to_string(),
        }],
    }
}

fn echo_pediatrie() -> Document {
    Document {
        id: DocumentId::new("echo-pediatrie"),
        title: "Audit Projet Écho-Pédiatrie".to_string(),
        subtitle: "Association Aide Médicale x Padre Pio".to_string(),
        sections: Sections {
            forces: section(
                "Pertinence & Objectifs du Projet",
                "Projet innovant axé sur l'échographie au lit du patient (POCUS) pour 1000 \
                 enfants/mois.",
                "POCUS pour 1000 enfants/mois à Padre Pio Douala. Réduire délai diagnostique. \
                 Innovation pédiatrique Douala.",
            ),
            faiblesses: section(
                "Problématique & Risques",
                "Dépendance aux examens coûteux et manque de personnel qualifié pour \
                 l'imagerie.",
                "Problématique: Retards diagnostiques, insuffisance personnel formé, contraintes \
                 financières familles.",
            ),
            propositions: section(
                "Budget & Pérennisation",
                "Budget de 12M FCFA incluant équipements et formation certifiante.",
                "Budget: 12M FCFA. Pérennisation: Quote-part maintenance, formation continue \
                 certificante.",
            ),
        },
        full_reference: ECHO_REFERENCE.to_string(),
        presets: Vec::new(),
    }
}

const SPHINX_REFERENCE: &str = "\
SPHINX CONSULTING
Cabinet de conseil stratégique, santé publique et développement

1. PRÉSENTATION GÉNÉRALE
SPHINX Consulting est un cabinet de conseil pluridisciplinaire spécialisé dans \
l'accompagnement stratégique des institutions publiques, organisations internationales, ONG, \
associations et structures privées à impact social. Le cabinet intervient principalement dans \
les domaines de la santé publique, du développement humain, de l'économie appliquée et de la \
gouvernance des projets et politiques publiques.

2. VISION, MISSION ET VALEURS
Vision : contribuer durablement à l'amélioration des systèmes sociaux et sanitaires par un \
conseil stratégique fondé sur l'expertise, l'innovation et l'équité.
Mission : appuyer les décideurs et les organisations dans la conception, la mise en œuvre et \
l'évaluation de politiques, programmes et projets à fort impact social.
Valeurs : excellence technique, éthique, approche contextuelle, orientation résultats, équité.

3. DOMAINES D'INTERVENTION
Conseil en santé publique et systèmes de santé, économie de la santé, gestion de projets, \
études et recherche appliquée, renforcement des capacités.

4. ORGANISATION ET RESSOURCES HUMAINES
Le cabinet repose sur une structure d'experts hautement qualifiés, complétée par un réseau de \
consultants associés mobilisés selon les missions.

5. GRILLE TARIFAIRE INDICATIVE
Études stratégiques de 1,8 à 9 millions FCFA selon l'envergure de la mission.

6. PLAN DE RECRUTEMENT PROGRESSIF
SPHINX Consulting adopte une croissance organique pour maîtriser ses coûts fixes.

7. CODE D'ÉTHIQUE ET DE CONDUITE
Confidentialité, indépendance, transparence et prévention des conflits d'intérêts.";

const ECHO_REFERENCE: &str = "\
INTÉGRATION DE L'ÉCHOGRAPHIE CLINIQUE AUX URGENCES PÉDIATRIQUES
Hôpital Catholique Padre Pio, Douala

1. PRÉSENTATION DE L'ÉTABLISSEMENT
L'Hôpital Catholique Padre Pio est une structure sanitaire à forte vocation sociale et \
humanitaire, accueillant en moyenne 1 000 enfants par mois. Les urgences pédiatriques \
constituent un service stratégique, confronté à une forte affluence et à la nécessité de \
décisions rapides.

2. PROBLÉMATIQUE
Retards diagnostiques, insuffisance de personnel formé à l'imagerie, contraintes financières \
des familles face aux examens coûteux.

3. OBJECTIFS DU PROJET
Améliorer durablement la prise en charge des urgences pédiatriques grâce à l'utilisation \
structurée de l'échographie clinique (POCUS).

4. DESCRIPTION DES ACTIVITÉS
Diagnostic organisationnel, acquisition de deux échographes portables, formation certifiante \
des médecins et infirmiers, intégration aux protocoles de soins, suivi et évaluation.

5. BUDGET PRÉVISIONNEL
12 millions FCFA incluant équipements et formation.

6. PÉRENNISATION
Une quote-part symbolique sur chaque examen alimente un fonds de maintenance ; la formation est \
intégrée au cursus d'accueil du nouveau personnel soignant.

7. CONCLUSION
Ce projet, porté par l'Association Aide Médicale, allie expertise technique et mission \
humanitaire pour offrir aux enfants les plus vulnérables des soins de standard international.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_ids_match_seed_documents() {
        let docs = builtin_documents();
        let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, BUILTIN_IDS.to_vec());
        assert!(docs.iter().all(|d| is_builtin_id(&d.id) && !d.id.is_custom()));
    }

    #[test]
    fn sphinx_offers_a_proposals_preset() {
        let docs = builtin_documents();
        assert!(docs[0].preset(SectionTopic::Propositions).is_some());
        assert!(docs[0].preset(SectionTopic::Forces).is_none());
        assert!(docs[1].presets.is_empty());
    }
}
