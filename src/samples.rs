//! Fixed literary sample texts
//!
//! Both texts are Andrew Byrd's 2013 recitations.

use crate::PieError;
use std::fmt;
use std::str::FromStr;

/// A sample passage with its translation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleText {
    pub title: &'static str,
    pub url: &'static str,
    /// Reconstructed text, fed to the transcriber
    pub pie: &'static str,
    /// English translation, display only
    pub eng: &'static str,
}

/// Which sample to speak
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleId {
    SheepAndHorses,
    KingAndGod,
}

impl SampleId {
    pub const ALL: [SampleId; 2] = [SampleId::SheepAndHorses, SampleId::KingAndGod];

    pub fn text(self) -> &'static SampleText {
        match self {
            SampleId::SheepAndHorses => &SHEEP_AND_HORSES,
            SampleId::KingAndGod => &KING_AND_GOD,
        }
    }

    /// Short name used on the command line
    pub fn key(self) -> &'static str {
        match self {
            SampleId::SheepAndHorses => "sheep",
            SampleId::KingAndGod => "king",
        }
    }
}

impl fmt::Display for SampleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text().title)
    }
}

impl FromStr for SampleId {
    type Err = PieError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sheep" | "sheep-and-horses" | "schleicher" => Ok(SampleId::SheepAndHorses),
            "king" | "king-and-god" => Ok(SampleId::KingAndGod),
            other => Err(PieError::Config(format!(
                "Unknown sample '{}' (expected 'sheep' or 'king')",
                other
            ))),
        }
    }
}

pub const SHEEP_AND_HORSES: SampleText = SampleText {
    title: "The Sheep and the Horses",
    url: "https://en.wikipedia.org/wiki/Schleicher%27s_fable",
    pie: "H₂óu̯is h₁éḱu̯ōs-kʷe. \
H₂áu̯ei̯ h₁i̯osméi̯ h₂u̯l̥h₁náh₂ né h₁ést, só h₁éḱu̯oms derḱt. \
Só gʷr̥hₓúm u̯óǵʰom u̯éǵʰet; só méǵh₂m̥ bʰórom; só dʰǵʰémonm̥ h₂ṓḱu bʰéret. \
H₂óu̯is h₁ékʷoi̯bʰi̯os u̯eu̯ked: “Dʰǵʰéses ḱḗr moi̯ h₂ágʰnutor, dʰǵʰémonm̥ h₂éǵontm̥ h₁éḱu̯oms u̯idn̥téi̯.” \
H₁éḱu̯ōs tu u̯eu̯kond: “Ḱludʰí, h₂ou̯ei̯! Tód spéḱi̯omes, n̥sméi̯ h₂ágʰnutor ḱḗr: \
dʰǵʰémō, pótis, sē h₂áu̯i̯es h₂u̯l̥h₁náh₂ gʷʰérmom u̯éstrom u̯ept, h₂áu̯ibʰi̯os tu h₂u̯l̥h₁náh₂ né h₁esti.” \
Tód ḱéḱluu̯ōs h₂óu̯is h₂aǵróm bʰuged.",
    eng: "The Sheep and the Horses. \
A sheep that had no wool saw horses, one of them pulling a heavy wagon, one carrying a big load, \
and one carrying a man quickly. The sheep said to the horses: \"My heart pains me, seeing a man \
driving horses.\" The horses said: \"Listen, sheep, our hearts pain us when we see this: a man, \
the master, makes the wool of the sheep into a warm garment for himself. And the sheep has no wool.\" \
Having heard this, the sheep fled into the plain.",
};

pub const KING_AND_GOD: SampleText = SampleText {
    title: "The King and the God",
    url: "https://en.wikipedia.org/wiki/The_king_and_the_god",
    pie: "H₃rḗḱs dei̯u̯ós-kʷe. \
H₃rḗḱs h₁est; só n̥putlós. H₃rḗḱs súhₓnum u̯l̥nh₁to. \
Só tósi̯o ǵʰéutorm̥ prēḱst: “Súhₓnus moi̯ ǵn̥h₁i̯etōd!” \
Ǵʰéutōr tom h₃rḗǵm̥ u̯eu̯ked: “H₁i̯áǵesu̯o dei̯u̯óm U̯érunom.” \
Úpo h₃rḗḱs dei̯u̯óm U̯érunom sesole nú dei̯u̯óm i̯aǵeto. \
“Ḱludʰí moi̯, pater U̯érune!” \
Dei̯u̯ós U̯érunos diu̯és ḱm̥tá gʷah₂t. \
“Kʷid u̯elh₁si?” “Súhₓnum u̯elh₁mi.” \
“Tód h₁estu”, u̯éu̯ked lei̯bʰós dei̯u̯ós U̯érunos. \
Nu h₃rḗǵs pótnih₂ súhₓnum ǵeǵonh₁e.",
    eng: "The King and the God. \
Once there was a king. He was childless. The king wanted a son. \
He asked his priest: \"May a son be born to me!\" \
The priest said to the king: \"Pray to the god Werunos.\" \
The king approached the god Werunos to pray now to the god. \
\"Hear me, father Werunos!\" \
The god Werunos came down from heaven. \
\"What do you want?\" \"I want a son.\" \
\"Let this be so\", said the bright god Werunos. \
The king's lady bore a son.",
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sample_ids() {
        assert_eq!("sheep".parse::<SampleId>().unwrap(), SampleId::SheepAndHorses);
        assert_eq!(" King ".parse::<SampleId>().unwrap(), SampleId::KingAndGod);
        assert!("dragon".parse::<SampleId>().is_err());
    }

    #[test]
    fn test_keys_round_trip() {
        for id in SampleId::ALL {
            assert_eq!(id.key().parse::<SampleId>().unwrap(), id);
        }
    }

    #[test]
    fn test_texts_have_pauses() {
        for id in SampleId::ALL {
            let text = id.text();
            assert!(text.pie.contains(','));
            assert!(text.pie.contains('.'));
            assert!(!text.eng.is_empty());
        }
    }
}
