use proc_macro2::{Span, TokenStream};
use quote::quote;
use syn::{parse_macro_input, DeriveInput, Error, Field, Result};

/// Implements `rasterizer::Interpolate` by interpolating every named field.
#[proc_macro_derive(Interpolate)]
pub fn derive(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    let derive = parse_macro_input!(input as DeriveInput);

    match generate_impl(&derive) {
        Ok(tokens) => tokens,
        Err(e) => e.to_compile_error(),
    }
    .into()
}

fn named_fields(derive: &DeriveInput) -> Result<Vec<&Field>> {
    match &derive.data {
        syn::Data::Struct(syn::DataStruct {
            fields: syn::Fields::Named(syn::FieldsNamed { named, .. }),
            ..
        }) => Ok(named.iter().collect()),
        _ => Err(Error::new(
            Span::call_site(),
            "Interpolate can only be derived for structs with named fields",
        )),
    }
}

fn generate_field_interpolation(field: &Field) -> Result<TokenStream> {
    let name = field
        .ident
        .as_ref()
        .ok_or_else(|| Error::new(Span::call_site(), "Field must have a name"))?;
    let ty = &field.ty;
    Ok(quote! {
        #name : <#ty as ::rasterizer::Interpolate>::interpolate(&v0.#name, &v1.#name, &v2.#name, r0, r1, r2)
    })
}

fn generate_impl(derive: &DeriveInput) -> Result<TokenStream> {
    let struct_name = &derive.ident;
    let (impl_generics, ty_generics, where_clause) = derive.generics.split_for_impl();

    let field_assignments = named_fields(derive)?
        .into_iter()
        .map(generate_field_interpolation)
        .collect::<Result<Vec<_>>>()?;

    Ok(quote! {
        impl #impl_generics ::rasterizer::Interpolate for #struct_name #ty_generics #where_clause {
            fn interpolate(v0 : &Self, v1 : &Self, v2 : &Self, r0 : f32, r1 : f32, r2 : f32) -> Self {
                Self {
                    #(#field_assignments),*
                }
            }
        }
    })
}
