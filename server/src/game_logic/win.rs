use serde::Serialize;

use super::player::Player;

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Team {
    Crewmate,
    Impostor,
}

/// Decides whether the round is over.
///
/// The checks run in a fixed order so that two conditions becoming true
/// together always resolve the same way:
/// 1. no impostor alive: crewmates win
/// 2. alive impostors at least match alive crewmates: impostors win
/// 3. every task done: crewmates win
pub fn evaluate<'a, I>(players: I, completed_tasks: usize, total_tasks: usize) -> Option<Team>
where
    I: IntoIterator<Item = &'a Player>,
{
    let (alive_impostors, alive_crewmates) = players
        .into_iter()
        .filter(|player| player.alive)
        .fold((0usize, 0usize), |(impostors, crewmates), player| {
            if player.is_impostor() {
                (impostors + 1, crewmates)
            } else if player.is_crewmate() {
                (impostors, crewmates + 1)
            } else {
                (impostors, crewmates)
            }
        });

    if alive_impostors == 0 {
        return Some(Team::Crewmate);
    }
    if alive_impostors >= alive_crewmates {
        return Some(Team::Impostor);
    }
    if completed_tasks >= total_tasks {
        return Some(Team::Crewmate);
    }
    None
}
