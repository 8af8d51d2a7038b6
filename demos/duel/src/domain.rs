//! Duel rules behind the engine's domain contract
//!
//! A turn is: roll three dice, then attack, draw or raise wards, then end
//! the turn. An attack deals the highest die plus the attacker's power
//! bonus, minus the defender's armor, and opens a response window where the
//! defender may spend a guard (reduce) or a dodge (evade), or raise a ward.
//! Wards are consumed once, when the damage lands.

use crate::game::{
    Card, Duel, DuelCommand, DuelCore, DuelEvent, Fighter, DICE_PER_ROLL, MAX_HAND, STARTING_HAND,
    STARTING_HP,
};
use tabula_core::primitives::{DamageCalculation, TokenTable};
use tabula_core::systems::interaction::CARD_UID_KEY;
use tabula_core::{
    create_simple_choice, DefId, DomainCore, DomainFault, EntityRef, EventBody, EventBodyOf,
    EventOf, Interaction, InteractionOption, MatchState, PendingDamage, PlayerId, RandomSource,
    Rejection, SysEvent, Value,
};
use tracing::debug;

/// Rejection codes raised by the duel rules
pub mod codes {
    pub const MATCH_OVER: &str = "match.over";
    pub const UNKNOWN_SEAT: &str = "seat.unknown";
    pub const NOT_ACTIVE: &str = "turn.not_active";
    pub const ALREADY_ROLLED: &str = "dice.already_rolled";
    pub const NO_DICE: &str = "dice.none";
    pub const NO_WINDOW: &str = "token.no_window";
    pub const UNKNOWN_TOKEN: &str = "token.unknown";
    pub const NOT_REACTIVE: &str = "token.not_reactive";
    pub const NOT_HELD: &str = "token.not_held";
    pub const NOT_IN_HAND: &str = "card.not_in_hand";
    pub const HAND_FULL: &str = "hand.full";
    pub const HAND_EMPTY: &str = "hand.empty";
}

const STRIKE: &str = "strike";
const WARD_FACES: u32 = 3;
/// Generator id that rebuilds a discard prompt from the prompted hand
pub const HAND_GENERATOR: &str = "prompted_hand";

pub struct DuelDomain {
    tokens: TokenTable,
}

impl DuelDomain {
    pub fn new(tokens: TokenTable) -> Self {
        Self { tokens }
    }

    pub fn tokens(&self) -> &TokenTable {
        &self.tokens
    }

    /// The damage `attacker` would deal to `target` with a top die of `base`
    pub fn strike<'a>(
        &'a self,
        core: &'a DuelCore,
        attacker: &PlayerId,
        target: &PlayerId,
        base: u32,
    ) -> DamageCalculation<'a, DuelCore> {
        DamageCalculation::new(core, &self.tokens, attacker.clone(), target.clone(), base)
            .ability(STRIKE)
    }

    fn require_active(core: &DuelCore, player_id: &PlayerId) -> Result<(), Rejection> {
        if core.active_player() == Some(player_id) {
            Ok(())
        } else {
            Err(Rejection::new(
                codes::NOT_ACTIVE,
                format!("it is not {player_id}'s turn"),
            ))
        }
    }

    fn validate_token(
        &self,
        state: &MatchState<Duel>,
        fighter: &Fighter,
        token_id: &str,
    ) -> Result<(), Rejection> {
        if !state.is_response_window_open() {
            return Err(Rejection::new(
                codes::NO_WINDOW,
                "tokens can only be spent against incoming damage",
            ));
        }
        let Some(def) = self.tokens.get(token_id) else {
            return Err(Rejection::new(
                codes::UNKNOWN_TOKEN,
                format!("no token named {token_id}"),
            ));
        };
        if def.response_modifier.is_none() && !def.evades {
            return Err(Rejection::new(
                codes::NOT_REACTIVE,
                format!("{} does nothing in a response window", def.name),
            ));
        }
        if fighter.stacks(token_id) == 0 {
            return Err(Rejection::new(
                codes::NOT_HELD,
                format!("no {} left", def.name),
            ));
        }
        Ok(())
    }
}

fn card_option(card: &Card) -> InteractionOption {
    let value: Value = [(CARD_UID_KEY, Value::from(card.uid.as_str()))]
        .into_iter()
        .collect();
    InteractionOption::new(
        format!("card-{}", card.uid),
        format!("Ward {}", card.ward),
        value,
    )
}

fn deal(core: &DuelCore, random: &mut dyn RandomSource) -> Card {
    Card {
        uid: format!("c{}", core.next_card),
        ward: random.d(WARD_FACES),
    }
}

fn fault(message: &str) -> DomainFault {
    DomainFault::new(message)
}

impl DomainCore<Duel> for DuelDomain {
    fn setup(&self, player_ids: &[PlayerId], random: &mut dyn RandomSource) -> DuelCore {
        let mut core = DuelCore {
            seats: player_ids.to_vec(),
            ..DuelCore::default()
        };
        for player_id in player_ids {
            let mut fighter = Fighter::new(STARTING_HP);
            fighter.gain_token("guard", 1);
            fighter.gain_token("dodge", 1);
            for _ in 0..STARTING_HAND {
                fighter.hand.push(deal(&core, random));
                core.next_card += 1;
            }
            core.fighters.insert(player_id.clone(), fighter);
        }
        core
    }

    fn validate(
        &self,
        state: &MatchState<Duel>,
        player_id: &PlayerId,
        command: &DuelCommand,
    ) -> Result<(), Rejection> {
        let core = &state.core;
        if let Some(winner) = &core.winner {
            return Err(Rejection::new(
                codes::MATCH_OVER,
                format!("{winner} already won"),
            ));
        }
        let Some(fighter) = core.fighter(player_id) else {
            return Err(Rejection::new(
                codes::UNKNOWN_SEAT,
                format!("{player_id} is not seated"),
            ));
        };

        match command {
            DuelCommand::Roll => {
                Self::require_active(core, player_id)?;
                if core.has_rolled {
                    return Err(Rejection::new(
                        codes::ALREADY_ROLLED,
                        "dice were already rolled this turn",
                    ));
                }
                Ok(())
            }
            DuelCommand::Attack => {
                Self::require_active(core, player_id)?;
                if core.dice.is_empty() {
                    return Err(Rejection::new(codes::NO_DICE, "roll before attacking"));
                }
                Ok(())
            }
            DuelCommand::UseToken { token_id } => self.validate_token(state, fighter, token_id),
            DuelCommand::RaiseWard { card_uid } => {
                // Inside a window the response gate has already checked the seat.
                if !state.is_response_window_open() {
                    Self::require_active(core, player_id)?;
                }
                if fighter.card(card_uid).is_none() {
                    return Err(Rejection::new(
                        codes::NOT_IN_HAND,
                        format!("{card_uid} is not in hand"),
                    ));
                }
                Ok(())
            }
            DuelCommand::Draw => {
                Self::require_active(core, player_id)?;
                if fighter.hand.len() >= MAX_HAND {
                    return Err(Rejection::new(codes::HAND_FULL, "hand is full"));
                }
                Ok(())
            }
            DuelCommand::AskDiscard => {
                Self::require_active(core, player_id)?;
                let empty = core
                    .opponent_of(player_id)
                    .and_then(|opponent| core.fighter(opponent))
                    .map_or(true, |f| f.hand.is_empty());
                if empty {
                    return Err(Rejection::new(
                        codes::HAND_EMPTY,
                        "opponent has nothing to discard",
                    ));
                }
                Ok(())
            }
            DuelCommand::EndTurn => Self::require_active(core, player_id),
        }
    }

    fn execute(
        &self,
        state: &MatchState<Duel>,
        player_id: &PlayerId,
        command: &DuelCommand,
        random: &mut dyn RandomSource,
    ) -> Result<Vec<EventBodyOf<Duel>>, DomainFault> {
        let core = &state.core;
        let fighter = core
            .fighter(player_id)
            .ok_or_else(|| fault("command from an unseated player"))?;

        Ok(match command {
            DuelCommand::Roll => {
                let faces = (0..DICE_PER_ROLL).map(|_| random.d(6)).collect();
                vec![EventBody::Domain(DuelEvent::DiceRolled {
                    player_id: player_id.clone(),
                    faces,
                })]
            }
            DuelCommand::Attack => {
                let target = core
                    .opponent_of(player_id)
                    .ok_or_else(|| fault("attack without an opponent"))?;
                let base = core.dice.iter().copied().max().unwrap_or(0);
                let damage = self.strike(core, player_id, target, base).resolve();
                let preview = self
                    .strike(core, player_id, target, base)
                    .preview_shields(true)
                    .resolve();
                let spent_tokens = fighter
                    .tokens
                    .keys()
                    .filter(|id| {
                        self.tokens
                            .get(id.as_str())
                            .is_some_and(|def| def.damage_bonus.is_some())
                    })
                    .cloned()
                    .collect();
                debug!(
                    attacker = %player_id,
                    target = %target,
                    base,
                    damage = damage.final_damage,
                    steps = damage.breakdown.steps.len(),
                    "attack declared"
                );

                let pending = PendingDamage::new(
                    format!("dmg-{}", state.sys.event_stream.next_id()),
                    Some(player_id.clone()),
                    target.clone(),
                    damage.final_damage,
                    "beforeDamageReceived",
                )
                .with_source_ability(STRIKE);
                vec![
                    EventBody::Domain(DuelEvent::AttackDeclared {
                        player_id: player_id.clone(),
                        target_player_id: target.clone(),
                        damage: damage.final_damage,
                        preview: preview.final_damage,
                        spent_tokens,
                    }),
                    EventBody::System(pending.request(Vec::new(), Vec::new())),
                ]
            }
            DuelCommand::UseToken { token_id } => {
                let def = self
                    .tokens
                    .get(token_id)
                    .ok_or_else(|| fault("token vanished after validation"))?;
                vec![EventBody::System(SysEvent::TokenUsed {
                    player_id: player_id.clone(),
                    token_id: token_id.clone(),
                    amount: 1,
                    damage_modifier: def.response_modifier.unwrap_or(0),
                    evade: def.evades,
                })]
            }
            DuelCommand::RaiseWard { card_uid } => {
                let card = fighter
                    .card(card_uid)
                    .ok_or_else(|| fault("card vanished after validation"))?;
                vec![EventBody::Domain(DuelEvent::WardRaised {
                    player_id: player_id.clone(),
                    card_uid: card.uid.clone(),
                    value: card.ward,
                })]
            }
            DuelCommand::Draw => vec![EventBody::Domain(DuelEvent::CardDrawn {
                player_id: player_id.clone(),
                card: deal(core, random),
            })],
            DuelCommand::AskDiscard => {
                let opponent = core
                    .opponent_of(player_id)
                    .ok_or_else(|| fault("discard without an opponent"))?;
                let options = core
                    .fighter(opponent)
                    .map(|f| f.hand.iter().map(card_option).collect())
                    .unwrap_or_default();
                let interaction = create_simple_choice(
                    format!("discard-{}", state.sys.event_stream.next_id()),
                    opponent.clone(),
                    "Discard a card",
                    options,
                )
                .with_source("ASK_DISCARD")
                .with_generator(HAND_GENERATOR);
                vec![EventBody::System(interaction.request())]
            }
            DuelCommand::EndTurn => {
                let next = core
                    .opponent_of(player_id)
                    .ok_or_else(|| fault("no seat to pass the turn to"))?;
                vec![EventBody::Domain(DuelEvent::TurnEnded {
                    player_id: player_id.clone(),
                    next_player_id: next.clone(),
                })]
            }
        })
    }

    fn reduce(&self, core: &DuelCore, event: &EventOf<Duel>) -> Result<DuelCore, DomainFault> {
        let mut core = core.clone();
        match &event.body {
            EventBody::Domain(DuelEvent::DiceRolled { player_id, faces }) => {
                core.dice = faces.clone();
                core.has_rolled = true;
                let mut sorted = faces.clone();
                sorted.sort_unstable();
                let pair = sorted.windows(2).any(|w| w[0] == w[1]);
                let triple = sorted.len() > 1 && sorted.windows(2).all(|w| w[0] == w[1]);
                let fighter = core
                    .fighter_mut(player_id)
                    .ok_or_else(|| fault("dice rolled by an unseated player"))?;
                if pair {
                    fighter.gain_token("power", 1);
                }
                if triple {
                    fighter.gain_status("armor");
                }
            }
            EventBody::Domain(DuelEvent::AttackDeclared {
                player_id,
                spent_tokens,
                ..
            }) => {
                core.dice.clear();
                let fighter = core
                    .fighter_mut(player_id)
                    .ok_or_else(|| fault("attack by an unseated player"))?;
                for token_id in spent_tokens {
                    fighter.tokens.shift_remove(token_id);
                }
            }
            EventBody::Domain(DuelEvent::WardRaised {
                player_id,
                card_uid,
                value,
            }) => {
                let fighter = core
                    .fighter_mut(player_id)
                    .ok_or_else(|| fault("ward raised by an unseated player"))?;
                fighter
                    .remove_card(card_uid)
                    .ok_or_else(|| fault("raised a ward not in hand"))?;
                fighter.shields.add(*value, Some(card_uid.clone()));
            }
            EventBody::Domain(DuelEvent::CardDrawn { player_id, card }) => {
                core.next_card += 1;
                core.fighter_mut(player_id)
                    .ok_or_else(|| fault("card drawn by an unseated player"))?
                    .hand
                    .push(card.clone());
            }
            EventBody::Domain(DuelEvent::CardDiscarded {
                player_id,
                card_uid,
            }) => {
                core.fighter_mut(player_id)
                    .ok_or_else(|| fault("discard by an unseated player"))?
                    .remove_card(card_uid)
                    .ok_or_else(|| fault("discarded a card not in hand"))?;
            }
            EventBody::Domain(DuelEvent::TurnEnded { next_player_id, .. }) => {
                core.active = core
                    .seats
                    .iter()
                    .position(|p| p == next_player_id)
                    .ok_or_else(|| fault("turn passed to an unseated player"))?;
                core.turn += 1;
                core.dice.clear();
                core.has_rolled = false;
            }
            EventBody::System(SysEvent::TokenUsed {
                player_id,
                token_id,
                amount,
                ..
            }) => {
                if let Some(fighter) = core.fighter_mut(player_id) {
                    fighter.spend_token(token_id, *amount);
                }
            }
            EventBody::System(SysEvent::DamageDealt {
                source_player_id,
                target_player_id,
                amount,
                ..
            }) => {
                let winner = source_player_id
                    .clone()
                    .or_else(|| core.opponent_of(target_player_id).cloned());
                let fighter = core
                    .fighter_mut(target_player_id)
                    .ok_or_else(|| fault("damage dealt to an unseated player"))?;
                let through = fighter.shields.absorb(*amount);
                fighter.hp -= i64::from(through);
                let down = fighter.is_down();
                if down && core.winner.is_none() {
                    core.winner = winner;
                }
            }
            EventBody::System(_) => {}
        }
        Ok(core)
    }

    fn entity_is_live(&self, core: &DuelCore, entity: &EntityRef) -> bool {
        match entity {
            EntityRef::Card(uid) => core.holder_of(uid).is_some(),
            _ => true,
        }
    }

    fn generate_options(
        &self,
        core: &DuelCore,
        generator: &DefId,
        interaction: &Interaction,
    ) -> Option<Vec<InteractionOption>> {
        if generator.as_str() != HAND_GENERATOR {
            return None;
        }
        core.fighter(&interaction.player_id)
            .map(|f| f.hand.iter().map(card_option).collect())
    }

    fn resolve_interaction(
        &self,
        _state: &MatchState<Duel>,
        player_id: &PlayerId,
        _interaction: &Interaction,
        chosen: &[InteractionOption],
        _random: &mut dyn RandomSource,
    ) -> Result<Vec<EventBodyOf<Duel>>, DomainFault> {
        Ok(chosen
            .iter()
            .filter_map(|option| match option.entity_ref() {
                Some(EntityRef::Card(card_uid)) => {
                    Some(EventBody::Domain(DuelEvent::CardDiscarded {
                        player_id: player_id.clone(),
                        card_uid,
                    }))
                }
                _ => None,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{pipeline, seats};
    use std::sync::Arc;
    use tabula_core::{
        codes as sys_codes, execute_pipeline, new_match, Command, CommandOf, EventKind,
        PipelineConfig, PipelineOutcome, SequenceRandom, SysCommand,
    };

    /// Runs commands against one match with scripted dice
    struct Table {
        pipeline: Arc<PipelineConfig<Duel>>,
        state: MatchState<Duel>,
        random: SequenceRandom,
    }

    impl Table {
        /// Every dealt card is a ward of 2
        fn new() -> Self {
            let pipeline = pipeline().unwrap();
            let mut random = SequenceRandom::dice(&[2], WARD_FACES);
            let state = new_match(&pipeline, &seats(), &mut random);
            Self {
                pipeline,
                state,
                random,
            }
        }

        fn run(&mut self, command: CommandOf<Duel>) -> PipelineOutcome<Duel> {
            let outcome = execute_pipeline(
                &self.pipeline,
                &self.state,
                &command,
                &mut self.random,
                &seats(),
            )
            .unwrap();
            if let PipelineOutcome::Applied { state, .. } = &outcome {
                self.state = state.clone();
            }
            outcome
        }

        fn play(&mut self, player: &str, command: DuelCommand) -> PipelineOutcome<Duel> {
            self.run(Command::domain(player, command))
        }

        fn sys(&mut self, player: &str, command: SysCommand) -> PipelineOutcome<Duel> {
            self.run(Command::system(player, command))
        }

        fn roll(&mut self, player: &str, faces: &[u32]) -> PipelineOutcome<Duel> {
            self.random = SequenceRandom::dice(faces, 6);
            self.play(player, DuelCommand::Roll)
        }

        fn fighter(&self, player: &str) -> &Fighter {
            self.state.core.fighter(&PlayerId::from(player)).unwrap()
        }

        fn token(id: &str) -> DuelCommand {
            DuelCommand::UseToken {
                token_id: id.to_string(),
            }
        }
    }

    fn types(outcome: &PipelineOutcome<Duel>) -> Vec<String> {
        match outcome {
            PipelineOutcome::Applied { events, .. } => events
                .iter()
                .map(|e| e.event.event_type().to_string())
                .collect(),
            PipelineOutcome::Rejected { .. } => Vec::new(),
        }
    }

    fn code(outcome: &PipelineOutcome<Duel>) -> Option<&str> {
        outcome.rejection().map(|r| r.code.as_str())
    }

    #[test]
    fn test_setup() {
        let table = Table::new();
        let core = &table.state.core;
        assert_eq!(core.active_player(), Some(&PlayerId::from("0")));
        assert_eq!(core.next_card, 6);
        for seat in ["0", "1"] {
            let fighter = table.fighter(seat);
            assert_eq!(fighter.hp, STARTING_HP);
            assert_eq!(fighter.hand.len(), STARTING_HAND);
            assert!(fighter.hand.iter().all(|c| c.ward == 2));
            assert_eq!(fighter.stacks("guard"), 1);
            assert_eq!(fighter.stacks("dodge"), 1);
        }
        assert_eq!(table.fighter("1").hand[0].uid, "c3");
    }

    #[test]
    fn test_turn_gating() {
        let mut table = Table::new();
        assert_eq!(code(&table.roll("1", &[1, 2, 3])), Some(codes::NOT_ACTIVE));
        assert_eq!(
            code(&table.play("0", DuelCommand::Attack)),
            Some(codes::NO_DICE)
        );
        assert!(table.roll("0", &[1, 2, 3]).is_applied());
        assert_eq!(code(&table.roll("0", &[1, 2, 3])), Some(codes::ALREADY_ROLLED));

        let outcome = table.play("0", DuelCommand::EndTurn);
        assert_eq!(types(&outcome), vec!["TURN_ENDED"]);
        assert_eq!(table.state.core.active, 1);
        assert_eq!(table.state.core.turn, 1);
        assert!(table.state.core.dice.is_empty());
        assert!(table.roll("1", &[4, 5, 6]).is_applied());
    }

    #[test]
    fn test_pair_grants_power_and_triple_grants_armor() {
        let mut table = Table::new();
        table.roll("0", &[3, 3, 3]);
        assert_eq!(table.fighter("0").stacks("power"), 1);
        assert_eq!(table.fighter("0").statuses.get("armor"), Some(&1));
    }

    #[test]
    fn test_guard_then_pass_deals_reduced_damage() {
        let mut table = Table::new();
        table.roll("0", &[5, 5, 2]);
        assert_eq!(table.fighter("0").stacks("power"), 1);

        let outcome = table.play("0", DuelCommand::Attack);
        assert_eq!(
            types(&outcome),
            vec!["ATTACK_DECLARED", "TOKEN_RESPONSE_REQUESTED"]
        );
        // top die 5, power +2
        let pending = table.state.sys.response.pending_damage.clone().unwrap();
        assert_eq!(pending.current_damage, 7);
        assert_eq!(pending.target_player_id, PlayerId::from("1"));
        assert_eq!(table.fighter("0").stacks("power"), 0);
        assert!(table.state.core.dice.is_empty());

        assert_eq!(
            code(&table.play("0", DuelCommand::EndTurn)),
            Some(sys_codes::RESPONSE_NOT_RESPONDER)
        );
        assert_eq!(
            code(&table.roll("1", &[1, 1, 1])),
            Some(sys_codes::RESPONSE_CATEGORY_BLOCKED)
        );

        let outcome = table.play("1", Table::token("guard"));
        assert_eq!(types(&outcome), vec!["TOKEN_USED"]);
        assert_eq!(table.fighter("1").stacks("guard"), 0);
        assert_eq!(
            table.state.sys.response.pending_damage.as_ref().unwrap().current_damage,
            5
        );
        assert_eq!(
            code(&table.play("1", Table::token("guard"))),
            Some(codes::NOT_HELD)
        );

        let outcome = table.sys("1", SysCommand::ResponsePass);
        assert_eq!(
            types(&outcome),
            vec!["TOKEN_RESPONSE_CLOSED", "DAMAGE_DEALT"]
        );
        assert_eq!(table.fighter("1").hp, STARTING_HP - 5);
        assert!(!table.state.is_response_window_open());
    }

    #[test]
    fn test_dodge_evades() {
        let mut table = Table::new();
        table.roll("0", &[4, 1, 2]);
        table.play("0", DuelCommand::Attack);
        let outcome = table.play("1", Table::token("dodge"));
        assert_eq!(types(&outcome), vec!["TOKEN_USED", "TOKEN_RESPONSE_CLOSED"]);
        assert_eq!(table.fighter("1").hp, STARTING_HP);
        assert!(!table.state.is_response_window_open());
    }

    #[test]
    fn test_token_rejections() {
        let mut table = Table::new();
        assert_eq!(
            code(&table.play("0", Table::token("guard"))),
            Some(codes::NO_WINDOW)
        );
        table.roll("0", &[4, 1, 2]);
        table.play("0", DuelCommand::Attack);
        assert_eq!(
            code(&table.play("1", Table::token("power"))),
            Some(codes::NOT_REACTIVE)
        );
        assert_eq!(
            code(&table.play("1", Table::token("luck"))),
            Some(codes::UNKNOWN_TOKEN)
        );
    }

    #[test]
    fn test_ward_absorbs_once() {
        let mut table = Table::new();
        table.play("0", DuelCommand::EndTurn);
        let outcome = table.play(
            "1",
            DuelCommand::RaiseWard {
                card_uid: "c3".into(),
            },
        );
        assert_eq!(types(&outcome), vec!["WARD_RAISED"]);
        assert_eq!(table.fighter("1").shields.total(), 2);
        assert_eq!(table.fighter("1").hand.len(), 2);
        table.play("1", DuelCommand::EndTurn);

        table.roll("0", &[4, 1, 2]);
        table.play("0", DuelCommand::Attack);
        let declared = table
            .state
            .event_stream()
            .entries()
            .iter()
            .find_map(|e| match &e.event.body {
                EventBody::Domain(DuelEvent::AttackDeclared {
                    damage, preview, ..
                }) => Some((*damage, *preview)),
                _ => None,
            })
            .unwrap();
        assert_eq!(declared, (4, 2));

        table.sys("1", SysCommand::ResponsePass);
        assert_eq!(table.fighter("1").hp, STARTING_HP - 2);
        assert!(table.fighter("1").shields.is_empty());
    }

    #[test]
    fn test_ward_raised_inside_window() {
        let mut table = Table::new();
        table.roll("0", &[6, 1, 2]);
        table.play("0", DuelCommand::Attack);
        let outcome = table.play(
            "1",
            DuelCommand::RaiseWard {
                card_uid: "c4".into(),
            },
        );
        assert_eq!(types(&outcome), vec!["WARD_RAISED"]);
        assert!(table.state.is_response_window_open());
        table.sys("1", SysCommand::ResponsePass);
        assert_eq!(table.fighter("1").hp, STARTING_HP - 4);
    }

    #[test]
    fn test_discard_prompt() {
        let mut table = Table::new();
        let outcome = table.play("0", DuelCommand::AskDiscard);
        assert_eq!(types(&outcome), vec!["INTERACTION_REQUESTED"]);
        let prompt = table.state.current_interaction().unwrap().clone();
        assert_eq!(prompt.player_id, PlayerId::from("1"));
        assert_eq!(prompt.data.options.len(), 3);

        assert_eq!(
            code(&table.play("0", DuelCommand::EndTurn)),
            Some(sys_codes::INTERACTION_PENDING)
        );
        let respond = |ids: &[&str]| SysCommand::InteractionRespond {
            interaction_id: prompt.id.clone(),
            option_ids: ids.iter().map(|s| s.to_string()).collect(),
        };
        assert_eq!(
            code(&table.sys("0", respond(&["card-c4"]))),
            Some(sys_codes::INTERACTION_NOT_OWNER)
        );
        assert_eq!(
            code(&table.sys("1", respond(&["card-c0"]))),
            Some(sys_codes::INTERACTION_UNKNOWN_OPTION)
        );

        let outcome = table.sys("1", respond(&["card-c4"]));
        assert_eq!(
            types(&outcome),
            vec![
                "INTERACTION_RESPONDED",
                "CARD_DISCARDED",
                "INTERACTION_COMPLETED"
            ]
        );
        assert!(table.fighter("1").card("c4").is_none());
        assert!(table.state.current_interaction().is_none());
        assert!(table.play("0", DuelCommand::EndTurn).is_applied());
    }

    #[test]
    fn test_discard_needs_cards() {
        let mut table = Table::new();
        for uid in ["c3", "c4", "c5"] {
            table.play("0", DuelCommand::AskDiscard);
            let id = table.state.current_interaction().unwrap().id.clone();
            table.sys(
                "1",
                SysCommand::InteractionRespond {
                    interaction_id: id,
                    option_ids: vec![format!("card-{uid}")],
                },
            );
        }
        assert_eq!(
            code(&table.play("0", DuelCommand::AskDiscard)),
            Some(codes::HAND_EMPTY)
        );
    }

    #[test]
    fn test_hand_limit() {
        let mut table = Table::new();
        for _ in STARTING_HAND..MAX_HAND {
            assert_eq!(types(&table.play("0", DuelCommand::Draw)), vec!["CARD_DRAWN"]);
        }
        assert_eq!(
            code(&table.play("0", DuelCommand::Draw)),
            Some(codes::HAND_FULL)
        );
        assert_eq!(table.fighter("0").hand.last().unwrap().uid, "c8");
    }

    #[test]
    fn test_undo_rewinds_draw() {
        let mut table = Table::new();
        let before = table.state.clone();
        table.play("0", DuelCommand::Draw);
        assert_eq!(table.state.event_stream().next_id(), 1);

        let outcome = table.sys("0", SysCommand::Undo);
        assert!(outcome.is_applied());
        assert_eq!(table.state.core, before.core);
        assert_eq!(table.state.event_stream().next_id(), 0);
        assert_eq!(
            code(&table.sys("0", SysCommand::Undo)),
            Some(sys_codes::UNDO_EMPTY)
        );
    }

    #[test]
    fn test_lethal_damage_ends_match() {
        let mut table = Table::new();
        if let Some(f) = table.state.core.fighter_mut(&PlayerId::from("1")) {
            f.hp = 3;
        }
        table.roll("0", &[4, 1, 2]);
        table.play("0", DuelCommand::Attack);
        table.sys("1", SysCommand::ResponsePass);
        assert_eq!(table.state.core.winner, Some(PlayerId::from("0")));
        assert_eq!(
            code(&table.play("0", DuelCommand::EndTurn)),
            Some(codes::MATCH_OVER)
        );
    }

    #[test]
    fn test_stale_option_dropped_on_refresh() {
        let domain = DuelDomain::new(TokenTable::new());
        let mut core = domain.setup(&seats(), &mut SequenceRandom::dice(&[1], WARD_FACES));
        let prompt = create_simple_choice("p", "1", "Discard a card", Vec::new())
            .with_generator(HAND_GENERATOR);
        let before = domain
            .generate_options(&core, &DefId::from(HAND_GENERATOR), &prompt)
            .unwrap();
        assert_eq!(before.len(), 3);

        core.fighter_mut(&PlayerId::from("1"))
            .unwrap()
            .remove_card("c3");
        let after = domain
            .generate_options(&core, &DefId::from(HAND_GENERATOR), &prompt)
            .unwrap();
        assert_eq!(after.len(), 2);
        assert!(!domain.entity_is_live(&core, &EntityRef::Card("c3".into())));
        assert!(domain
            .generate_options(&core, &DefId::from("elsewhere"), &prompt)
            .is_none());
    }

    #[test]
    fn test_tutorial_basics() {
        let mut table = Table::new();
        let outcome = table.sys(
            "0",
            SysCommand::TutorialStart {
                manifest_id: "basics".into(),
            },
        );
        assert_eq!(types(&outcome), vec!["TUTORIAL_STARTED"]);
        assert_eq!(
            code(&table.play("0", DuelCommand::Draw)),
            Some(sys_codes::TUTORIAL_COMMAND_BLOCKED)
        );

        let outcome = table.roll("0", &[3, 1, 2]);
        assert_eq!(types(&outcome), vec!["DICE_ROLLED", "TUTORIAL_STEP_ADVANCED"]);

        // the scripted defender spends its guard and passes
        let outcome = table.play("0", DuelCommand::Attack);
        let seen = types(&outcome);
        for expected in [
            "ATTACK_DECLARED",
            "TUTORIAL_AI_PLAYED",
            "TOKEN_USED",
            "TOKEN_RESPONSE_CLOSED",
            "DAMAGE_DEALT",
        ] {
            assert!(seen.iter().any(|t| t == expected), "missing {expected}");
        }
        assert_eq!(table.fighter("1").hp, STARTING_HP - 1);
        assert_eq!(table.state.sys.tutorial.step_id.as_deref(), Some("defend"));

        assert_eq!(
            code(&table.play("0", DuelCommand::EndTurn)),
            Some(sys_codes::TUTORIAL_AWAITING_AI)
        );
        let outcome = table.sys("0", SysCommand::TutorialAiConsumed { step_id: None });
        assert_eq!(
            types(&outcome),
            vec!["TUTORIAL_AI_CONSUMED", "TUTORIAL_STEP_ADVANCED"]
        );

        let outcome = table.play("0", DuelCommand::EndTurn);
        assert_eq!(types(&outcome), vec!["TURN_ENDED", "TUTORIAL_COMPLETED"]);
        assert!(!table.state.sys.tutorial.active);
    }
}
