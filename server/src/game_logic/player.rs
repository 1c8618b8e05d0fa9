use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::map::{CatalogTask, Position};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Unassigned,
    Crewmate,
    Impostor,
}

/// A task handed to one crewmate for the current round.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct AssignedTask {
    pub id: usize,
    pub name: String,
    pub x: f32,
    pub y: f32,
}

impl AssignedTask {
    pub fn position(&self) -> Position {
        Position::new(self.x, self.y)
    }
}

impl From<&CatalogTask> for AssignedTask {
    fn from(task: &CatalogTask) -> Self {
        Self {
            id: task.id,
            name: task.name.to_string(),
            x: task.position.x,
            y: task.position.y,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Player {
    pub id: Uuid,
    pub name: String,
    pub color: &'static str,
    pub position: Position,
    pub role: Role,
    pub alive: bool,
    pub tasks: Vec<AssignedTask>,
    pub completed: Vec<bool>,
}

impl Player {
    pub fn new(id: Uuid, name: String, color: &'static str, position: Position) -> Self {
        Self {
            id,
            name,
            color,
            position,
            role: Role::Unassigned,
            alive: true,
            tasks: Vec::new(),
            completed: Vec::new(),
        }
    }

    pub fn is_impostor(&self) -> bool {
        self.role == Role::Impostor
    }

    pub fn is_crewmate(&self) -> bool {
        self.role == Role::Crewmate
    }

    pub fn completed_count(&self) -> usize {
        self.completed.iter().filter(|done| **done).count()
    }

    pub fn outstanding_tasks(&self) -> usize {
        self.tasks.len() - self.completed_count()
    }

    pub fn assign_round(&mut self, role: Role, tasks: Vec<AssignedTask>, spawn: Position) {
        self.role = role;
        self.completed = vec![false; tasks.len()];
        self.tasks = tasks;
        self.alive = true;
        self.position = spawn;
    }
}
