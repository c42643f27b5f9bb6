//! 数据模型模块
//! 权限 / 角色、成员关系、所有权树与排序

pub mod board;
pub mod membership;
pub mod position;
pub mod role;
